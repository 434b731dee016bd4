#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hal::{EncoderSource, HalError, HalResult, InertialSensor, TelemetrySink, Vector3d};
use tracker::{Board, IndexLatch, Resources};

/// Encoder whose count and write history stay visible to the test
#[derive(Clone, Default)]
pub struct SharedEncoder {
    pub count: Rc<Cell<i32>>,
    pub writes: Rc<Cell<usize>>,
    /// Added to the count on every read
    pub step: i32,
}

impl SharedEncoder {
    pub fn at(count: i32) -> Self {
        let encoder = SharedEncoder::default();
        encoder.count.set(count);
        encoder
    }

    pub fn ramp(step: i32) -> Self {
        SharedEncoder {
            step,
            ..SharedEncoder::default()
        }
    }
}

impl EncoderSource for SharedEncoder {
    fn read(&mut self) -> i32 {
        let count = self.count.get().wrapping_add(self.step);
        self.count.set(count);
        count
    }

    fn write(&mut self, count: i32) {
        self.count.set(count);
        self.writes.set(self.writes.get() + 1);
    }
}

pub struct StillImu {
    pub healthy: bool,
}

impl InertialSensor for StillImu {
    fn initialize(&mut self) -> HalResult<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(HalError::DeviceNotResponding)
        }
    }

    fn read_acceleration(&mut self) -> HalResult<Vector3d> {
        Ok(Vector3d::zeros())
    }

    fn read_temperature(&mut self) -> HalResult<f32> {
        Ok(22.4)
    }
}

#[derive(Clone, Default)]
pub struct ByteLog(pub Rc<RefCell<Vec<u8>>>);

impl TelemetrySink for ByteLog {
    fn write_all(&mut self, bytes: &[u8]) -> HalResult<()> {
        self.0.borrow_mut().extend_from_slice(bytes);
        Ok(())
    }
}

pub struct TestBoard {
    pub encoders: Vec<SharedEncoder>,
    pub latches: Vec<Option<IndexLatch>>,
    pub imu_healthy: bool,
    pub sink: ByteLog,
}

impl Board for TestBoard {
    fn name(&self) -> &str {
        "test"
    }

    fn split_resources(self) -> Resources {
        Resources {
            encoders: self
                .encoders
                .into_iter()
                .map(|e| Box::new(e) as Box<dyn EncoderSource>)
                .collect(),
            index_latches: self.latches,
            imu: Box::new(StillImu {
                healthy: self.imu_healthy,
            }),
            telemetry: Box::new(self.sink),
        }
    }
}
