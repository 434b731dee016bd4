use std::time::Duration;

use hal::Clock;
use log::info;

use crate::axis::AxisChannel;
use crate::board::{Board, Resources};
use crate::calibration::{await_calibration, AxisCalibrator};
use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::estimation::AxisEstimator;
use crate::scheduler::Scheduler;

/// Bring the tracker from power-up to a ready scheduler.
///
/// 1. IMU bring-up and bias calibration (fatal on failure)
/// 2. Zero axes without an index pulse, wait for the others
/// 3. Build and seed the per-axis estimators
///
/// `idle` runs while waiting for index pulses.
pub fn boot<B: Board>(
    board: B,
    config: &TrackerConfig,
    clock: &dyn Clock,
    idle: impl FnMut(),
) -> TrackerResult<Scheduler> {
    config.validate()?;
    info!("Booting boom tracker on {}", board.name());

    let Resources {
        mut encoders,
        index_latches,
        mut imu,
        telemetry,
    } = board.split_resources();

    if encoders.len() != config.axes.len() || index_latches.len() != encoders.len() {
        return Err(TrackerError::Resources(format!(
            "{} axes configured, board provides {} encoders and {} index lines",
            config.axes.len(),
            encoders.len(),
            index_latches.len()
        )));
    }

    imu.initialize().map_err(TrackerError::InertialInit)?;

    let mut calibrators = config
        .axes
        .iter()
        .zip(index_latches)
        .zip(encoders.iter_mut())
        .map(|((axis, latch), encoder)| {
            AxisCalibrator::for_channel(&AxisChannel::from_config(axis), latch, encoder.as_mut())
        })
        .collect::<TrackerResult<Vec<_>>>()?;

    let timeout = config
        .scheduler
        .calibration_timeout_ms
        .map(Duration::from_millis);
    info!("Waiting for index pulses (timeout: {:?})", timeout);
    await_calibration(&mut calibrators, &mut encoders, clock, timeout, idle)?;

    let axes = config
        .axes
        .iter()
        .map(|axis| AxisEstimator::new(axis, &config.scheduler))
        .collect::<TrackerResult<Vec<_>>>()?;

    let mut scheduler = Scheduler::new(&config.scheduler, axes, encoders, imu, telemetry)?;
    scheduler.seed()?;
    info!(
        "Tracker ready: {} axes, {}/{}/{} Hz",
        config.axes.len(),
        config.scheduler.fast_hz,
        config.scheduler.fusion_hz,
        config.scheduler.telemetry_hz
    );
    Ok(scheduler)
}
