//! One-shot encoder referencing
//!
//! Each axis starts `Armed`. The first index pulse loads the axis'
//! calibration offset into its encoder and moves it to `Calibrated`, where it
//! stays: later pulses (one per revolution) are ignored. Axes without an
//! index pulse are referenced at boot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hal::{Clock, EncoderSource};
use log::{debug, info};

use crate::axis::{AxisChannel, AxisId};
use crate::error::{TrackerError, TrackerResult};

/// Edge flag set from the index-pulse interrupt
///
/// The interrupt handler only calls [`IndexLatch::fire`]; the encoder write
/// happens when the owning [`AxisCalibrator`] is serviced.
#[derive(Debug, Clone, Default)]
pub struct IndexLatch {
    fired: Arc<AtomicBool>,
}

impl IndexLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.fired.store(true, Ordering::Release);
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Consume a pending pulse
    fn take(&self) -> bool {
        self.fired.swap(false, Ordering::AcqRel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Armed,
    Calibrated,
}

#[derive(Debug)]
pub struct AxisCalibrator {
    axis: AxisId,
    offset: i32,
    latch: Option<IndexLatch>,
    state: CalibrationState,
}

impl AxisCalibrator {
    /// Wait for an index pulse on `latch`
    pub fn armed(axis: AxisId, offset: i32, latch: IndexLatch) -> Self {
        AxisCalibrator {
            axis,
            offset,
            latch: Some(latch),
            state: CalibrationState::Armed,
        }
    }

    /// Reference the encoder immediately
    pub fn zeroed_at_boot(axis: AxisId, offset: i32, encoder: &mut dyn EncoderSource) -> Self {
        encoder.write(offset);
        debug!("{} encoder zeroed at boot to {}", axis, offset);
        AxisCalibrator {
            axis,
            offset,
            latch: None,
            state: CalibrationState::Calibrated,
        }
    }

    /// Build the calibrator a channel asks for.
    ///
    /// Fails if the channel expects an index pulse but the board has no
    /// latch wired for it.
    pub fn for_channel(
        channel: &AxisChannel,
        latch: Option<IndexLatch>,
        encoder: &mut dyn EncoderSource,
    ) -> TrackerResult<Self> {
        if !channel.has_index_pulse() {
            return Ok(Self::zeroed_at_boot(
                channel.id(),
                channel.calibration_offset(),
                encoder,
            ));
        }

        match latch {
            Some(latch) => Ok(Self::armed(channel.id(), channel.calibration_offset(), latch)),
            None => Err(TrackerError::Resources(format!(
                "{} axis expects an index pulse but the board provides none",
                channel.id()
            ))),
        }
    }

    /// Handle an index-pulse event.
    ///
    /// Returns true if this event calibrated the axis.
    pub fn trigger(&mut self, encoder: &mut dyn EncoderSource) -> bool {
        match self.state {
            CalibrationState::Armed => {
                encoder.write(self.offset);
                self.state = CalibrationState::Calibrated;
                info!("{} index found, encoder set to {}", self.axis, self.offset);
                true
            }
            CalibrationState::Calibrated => false,
        }
    }

    /// Apply a pending index pulse, if any
    pub fn service(&mut self, encoder: &mut dyn EncoderSource) -> bool {
        match &self.latch {
            Some(latch) if latch.take() => self.trigger(encoder),
            _ => false,
        }
    }

    pub fn axis(&self) -> AxisId {
        self.axis
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn is_calibrated(&self) -> bool {
        self.state == CalibrationState::Calibrated
    }
}

/// Block until every axis is calibrated.
///
/// Pending index pulses are applied on each pass, then `idle` runs. With no
/// timeout this waits forever, like the bare firmware did.
pub fn await_calibration(
    calibrators: &mut [AxisCalibrator],
    encoders: &mut [Box<dyn EncoderSource>],
    clock: &dyn Clock,
    timeout: Option<Duration>,
    mut idle: impl FnMut(),
) -> TrackerResult<()> {
    let start = clock.now_us();
    let timeout_us = timeout.map(|t| t.as_micros() as u64);

    loop {
        for (calibrator, encoder) in calibrators.iter_mut().zip(encoders.iter_mut()) {
            calibrator.service(encoder.as_mut());
        }

        let elapsed = clock.now_us().saturating_sub(start);
        if calibrators.iter().all(AxisCalibrator::is_calibrated) {
            info!(
                "All {} axes calibrated after {} ms",
                calibrators.len(),
                elapsed / 1000
            );
            return Ok(());
        }

        if timeout_us.is_some_and(|limit| elapsed >= limit) {
            let pending = calibrators
                .iter()
                .filter(|c| !c.is_calibrated())
                .map(AxisCalibrator::axis)
                .collect();
            return Err(TrackerError::CalibrationTimeout {
                pending,
                elapsed_ms: elapsed / 1000,
            });
        }

        idle();
    }
}
