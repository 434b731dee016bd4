use estimator::EstimatorError;
use hal::HalError;
use thiserror::Error;

use crate::axis::AxisId;

/// Errors raised by the boom tracker
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("estimator: {0}")]
    Estimator(#[from] EstimatorError),

    #[error("hardware: {0}")]
    Hal(#[from] HalError),

    /// Configuration is well-formed but unusable
    #[error("invalid configuration for {field}: {message}")]
    Config { field: String, message: String },

    /// Configuration file could not be read or parsed
    #[error("failed to load configuration from {path}: {message}")]
    ConfigLoad { path: String, message: String },

    /// Index pulse never arrived for some axes
    #[error("calibration timed out after {elapsed_ms} ms, pending axes: {pending:?}")]
    CalibrationTimeout { pending: Vec<AxisId>, elapsed_ms: u64 },

    /// Inertial sensor bring-up failed; not retried
    #[error("inertial sensor initialisation failed: {0}")]
    InertialInit(HalError),

    /// More axes pushed into a frame than it can carry
    #[error("telemetry frame overflow")]
    FrameOverflow,

    /// Number of axes handed over by the board does not match the configuration
    #[error("resource mismatch: {0}")]
    Resources(String),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl TrackerError {
    pub(crate) fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        TrackerError::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}
