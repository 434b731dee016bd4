use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use hal::{Clock, EncoderSource, HalError, HalResult, ImuBackend, TelemetrySink};
use tracker::{Board, CalibratedImu, IndexLatch, Resources};

use crate::plant::BoomPlant;

const GRAVITY: f64 = 9.80665;

/// ±4 g full scale over 16 bits
const ACCEL_SCALE: f32 = (4.0 * GRAVITY / 32768.0) as f32;

/// Mounting bias of the simulated accelerometer in m/s²
const ACCEL_BIAS: [f64; 3] = [0.05, -0.03, 0.02];

fn seconds<C: Clock>(clock: &C) -> f64 {
    clock.now_us() as f64 * 1.0e-6
}

/// Quadrature counter following the plant
pub struct SimEncoder<C> {
    plant: Arc<BoomPlant>,
    axis: usize,
    clock: C,
    /// Register value minus the plant's count
    base: i32,
}

impl<C: Clock> SimEncoder<C> {
    fn new(plant: Arc<BoomPlant>, axis: usize, clock: C) -> Self {
        // the counter powers up at zero wherever the boom happens to be
        let base = -plant.true_counts(axis, seconds(&clock));
        SimEncoder {
            plant,
            axis,
            clock,
            base,
        }
    }
}

impl<C: Clock> EncoderSource for SimEncoder<C> {
    fn read(&mut self) -> i32 {
        self.plant
            .true_counts(self.axis, seconds(&self.clock))
            .wrapping_add(self.base)
    }

    fn write(&mut self, count: i32) {
        self.base = count.wrapping_sub(self.plant.true_counts(self.axis, seconds(&self.clock)));
    }
}

/// Accelerometer mounted at the boom end
pub struct SimImu<C> {
    plant: Arc<BoomPlant>,
    clock: C,
    initialized: bool,
}

impl<C: Clock> ImuBackend for SimImu<C> {
    fn init(&mut self) -> HalResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn read_raw_accel(&mut self) -> HalResult<[i16; 3]> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        let mut accel = self.plant.acceleration(seconds(&self.clock));
        accel[2] += GRAVITY;

        let mut raw = [0i16; 3];
        for ((out, a), bias) in raw.iter_mut().zip(accel).zip(ACCEL_BIAS) {
            let lsb = ((a + bias) / ACCEL_SCALE as f64).round();
            *out = lsb.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }
        Ok(raw)
    }

    fn accel_scale(&self) -> f32 {
        ACCEL_SCALE
    }

    fn read_temperature(&mut self) -> HalResult<f32> {
        let t = seconds(&self.clock);
        Ok((24.0 + 0.5 * (0.1 * t).sin()) as f32)
    }
}

/// Fires an index latch whenever the axis crosses its index angle
pub struct IndexPulse<C> {
    plant: Arc<BoomPlant>,
    axis: usize,
    index_angle: f64,
    clock: C,
    latch: IndexLatch,
    above: Option<bool>,
}

impl<C: Clock> IndexPulse<C> {
    pub fn poll(&mut self) {
        let t = seconds(&self.clock);
        let above = self.plant.axes()[self.axis].swing.angle(t) >= self.index_angle;
        if self.above.is_some_and(|was| was != above) {
            self.latch.fire();
        }
        self.above = Some(above);
    }
}

/// Telemetry written to a file instead of a serial port
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &str) -> std::io::Result<Self> {
        Ok(FileSink {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl TelemetrySink for FileSink {
    fn write_all(&mut self, bytes: &[u8]) -> HalResult<()> {
        self.writer.write_all(bytes).map_err(|_| HalError::SinkWrite)
    }

    fn flush(&mut self) -> HalResult<()> {
        self.writer.flush().map_err(|_| HalError::SinkWrite)
    }
}

pub struct SitlBoard<C> {
    plant: Arc<BoomPlant>,
    clock: C,
    latches: Vec<Option<IndexLatch>>,
    bias_samples: u32,
    sink: FileSink,
}

impl<C: Clock + Clone + 'static> SitlBoard<C> {
    pub fn new(plant: BoomPlant, clock: C, bias_samples: u32, sink: FileSink) -> Self {
        let latches = plant
            .axes()
            .iter()
            .map(|axis| axis.index_angle.map(|_| IndexLatch::new()))
            .collect();
        SitlBoard {
            plant: Arc::new(plant),
            clock,
            latches,
            bias_samples,
            sink,
        }
    }

    /// Pulse generators feeding this board's index latches
    pub fn index_pulses(&self) -> Vec<IndexPulse<C>> {
        self.plant
            .axes()
            .iter()
            .enumerate()
            .zip(&self.latches)
            .filter_map(|((axis, plant_axis), latch)| {
                Some(IndexPulse {
                    plant: self.plant.clone(),
                    axis,
                    index_angle: plant_axis.index_angle?,
                    clock: self.clock.clone(),
                    latch: latch.clone()?,
                    above: None,
                })
            })
            .collect()
    }
}

impl<C: Clock + Clone + 'static> Board for SitlBoard<C> {
    fn name(&self) -> &str {
        "SITL"
    }

    fn split_resources(self) -> Resources {
        let encoders = (0..self.plant.axes().len())
            .map(|axis| {
                Box::new(SimEncoder::new(self.plant.clone(), axis, self.clock.clone()))
                    as Box<dyn EncoderSource>
            })
            .collect();
        let imu = SimImu {
            plant: self.plant.clone(),
            clock: self.clock.clone(),
            initialized: false,
        };

        Resources {
            encoders,
            index_latches: self.latches,
            imu: Box::new(CalibratedImu::new(imu, self.bias_samples)),
            telemetry: Box::new(self.sink),
        }
    }
}
