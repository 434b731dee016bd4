//! Telemetry frame codec
//!
//! Fixed little-endian layout, grouped by field for `N` axes:
//!
//! ```text
//! 0xAA 0x55
//! N x i32   raw encoder counts
//! N x f32   fused positions      [m]
//! N x f32   fused velocities     [m/s]
//! N x f32   fused accelerations  [m/s^2]
//! 3 x f32   inertial acceleration [m/s^2]
//! i32       temperature [degC, rounded]
//! ```
//!
//! The fused-acceleration block is an addition to the boom firmware's frame.
//! The old two-axis host receiver unpacked `<2i7fi` (42 bytes); two-axis
//! frames here are `<2i9fi` (50 bytes), so that receiver cannot read them.
//! Use [`FrameDecoder`], or the SITL CSV export, on the host instead.

use heapless::Vec as FixedVec;

use crate::axis::MAX_AXES;
use crate::error::{TrackerError, TrackerResult};

pub const HEADER: [u8; 2] = [0xAA, 0x55];

/// Frame length in bytes, header included
pub const fn frame_len(axes: usize) -> usize {
    HEADER.len() + 16 * axes + 3 * 4 + 4
}

pub const MAX_FRAME_LEN: usize = frame_len(MAX_AXES);

pub type FrameBuffer = FixedVec<u8, MAX_FRAME_LEN>;

/// Latest state of one axis as sent to the host
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisSample {
    pub count: i32,
    pub position: f32,
    pub velocity: f32,
    pub acceleration: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryFrame {
    axes: FixedVec<AxisSample, MAX_AXES>,
    imu_accel: [f32; 3],
    temperature: i32,
}

impl TelemetryFrame {
    pub fn new(imu_accel: [f32; 3], temperature_c: f32) -> Self {
        TelemetryFrame {
            axes: FixedVec::new(),
            imu_accel,
            temperature: temperature_c.round() as i32,
        }
    }

    pub fn push(&mut self, sample: AxisSample) -> TrackerResult<()> {
        self.axes
            .push(sample)
            .map_err(|_| TrackerError::FrameOverflow)
    }

    pub fn axes(&self) -> &[AxisSample] {
        &self.axes
    }

    pub fn imu_accel(&self) -> [f32; 3] {
        self.imu_accel
    }

    pub fn temperature(&self) -> i32 {
        self.temperature
    }

    pub fn len(&self) -> usize {
        frame_len(self.axes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn encode(&self) -> TrackerResult<FrameBuffer> {
        let mut out = FrameBuffer::new();
        put(&mut out, &HEADER)?;
        for axis in &self.axes {
            put(&mut out, &axis.count.to_le_bytes())?;
        }
        for axis in &self.axes {
            put(&mut out, &axis.position.to_le_bytes())?;
        }
        for axis in &self.axes {
            put(&mut out, &axis.velocity.to_le_bytes())?;
        }
        for axis in &self.axes {
            put(&mut out, &axis.acceleration.to_le_bytes())?;
        }
        for value in self.imu_accel {
            put(&mut out, &value.to_le_bytes())?;
        }
        put(&mut out, &self.temperature.to_le_bytes())?;
        Ok(out)
    }

    /// Parse one complete frame, header included
    pub fn decode(bytes: &[u8], axes: usize) -> Option<Self> {
        if axes == 0 || axes > MAX_AXES || bytes.len() < frame_len(axes) {
            return None;
        }
        if bytes[..2] != HEADER {
            return None;
        }

        let word = |index: usize| -> Option<[u8; 4]> {
            let start = HEADER.len() + 4 * index;
            bytes.get(start..start + 4)?.try_into().ok()
        };
        let float = |index: usize| word(index).map(f32::from_le_bytes);

        let mut frame = TelemetryFrame::default();
        for i in 0..axes {
            let sample = AxisSample {
                count: i32::from_le_bytes(word(i)?),
                position: float(axes + i)?,
                velocity: float(2 * axes + i)?,
                acceleration: float(3 * axes + i)?,
            };
            frame.push(sample).ok()?;
        }
        let imu = 4 * axes;
        frame.imu_accel = [float(imu)?, float(imu + 1)?, float(imu + 2)?];
        frame.temperature = i32::from_le_bytes(word(imu + 3)?);
        Some(frame)
    }
}

fn put(out: &mut FrameBuffer, bytes: &[u8]) -> TrackerResult<()> {
    out.extend_from_slice(bytes)
        .map_err(|_| TrackerError::FrameOverflow)
}

/// Host-side receiver that splits a byte stream into frames.
///
/// Bytes before a header are discarded, so a reader that attaches mid-frame
/// resynchronises on the next header.
#[derive(Debug)]
pub struct FrameDecoder {
    axes: usize,
    buffer: Vec<u8>,
    discarded: usize,
}

impl FrameDecoder {
    pub fn new(axes: usize) -> Self {
        FrameDecoder {
            axes,
            buffer: Vec::with_capacity(2 * frame_len(axes)),
            discarded: 0,
        }
    }

    /// Feed received bytes and collect every completed frame
    pub fn push(&mut self, bytes: &[u8]) -> Vec<TelemetryFrame> {
        self.buffer.extend_from_slice(bytes);
        let len = frame_len(self.axes);
        let mut frames = Vec::new();

        loop {
            match self.buffer.windows(2).position(|w| w == HEADER) {
                Some(0) => {}
                Some(start) => {
                    self.discarded += start;
                    self.buffer.drain(..start);
                }
                None => {
                    // keep a trailing 0xAA, it may start the next header
                    let keep = usize::from(self.buffer.last() == Some(&HEADER[0]));
                    let drop = self.buffer.len() - keep;
                    self.discarded += drop;
                    self.buffer.drain(..drop);
                    break;
                }
            }

            if self.buffer.len() < len {
                break;
            }
            if let Some(frame) = TelemetryFrame::decode(&self.buffer[..len], self.axes) {
                frames.push(frame);
            }
            self.buffer.drain(..len);
        }

        frames
    }

    /// Bytes thrown away while searching for a header
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}
