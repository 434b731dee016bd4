//! Boom tracker
//!
//! Estimates position, velocity and acceleration of each boom axis from
//! quadrature encoder counts and an accelerometer, and streams the result to
//! a host as fixed-layout telemetry frames.
//!
//! ```text
//! encoder --(A, fast)--> PLL --(B, fusion)--> Kalman --(C, telemetry)--> frame
//!                               ^
//!                         accelerometer
//! ```

mod axis;
mod board;
mod boot;
mod calibration;
mod clock;
mod config;
mod error;
mod estimation;
mod inertial;
mod scheduler;
mod telemetry;

pub use axis::{AxisChannel, AxisId, MAX_AXES};
pub use board::{Board, Resources};
pub use boot::boot;
pub use calibration::{await_calibration, AxisCalibrator, CalibrationState, IndexLatch};
pub use clock::{SimClock, StdClock};
pub use config::{
    AccelComponent, AxisConfig, ImuConfig, KalmanConfig, SchedulerConfig, TelemetryConfig,
    TrackerConfig,
};
pub use error::{TrackerError, TrackerResult};
pub use estimation::{AxisEstimator, AxisFilter, FusedState};
pub use inertial::{estimate_stationary_bias, CalibratedImu};
pub use scheduler::{Scheduler, TaskId, TaskStats, TickOutcome};
pub use telemetry::{frame_len, AxisSample, FrameDecoder, TelemetryFrame, HEADER, MAX_FRAME_LEN};
