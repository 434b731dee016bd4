use hal::{EncoderSource, InertialSensor, TelemetrySink};

use crate::calibration::IndexLatch;

/// Hardware the tracker runs on
pub trait Board
where
    Self: Sized,
{
    fn name(&self) -> &str;

    /// Hand over the peripherals, one encoder per configured axis, in
    /// configuration order
    fn split_resources(self) -> Resources;
}

pub struct Resources {
    pub encoders: Vec<Box<dyn EncoderSource>>,
    /// Index-pulse latch per encoder; `None` where no index line is wired
    pub index_latches: Vec<Option<IndexLatch>>,
    pub imu: Box<dyn InertialSensor>,
    pub telemetry: Box<dyn TelemetrySink>,
}
