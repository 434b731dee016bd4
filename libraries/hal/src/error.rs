use thiserror::Error;

/// Errors reported by hardware collaborators
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The device did not answer during bring-up (wrong id, no ack)
    #[error("device not responding")]
    DeviceNotResponding,

    /// A read was attempted before `init` succeeded
    #[error("device not initialized")]
    NotInitialized,

    /// Bus transfer failed (I2C/SPI NACK, arbitration loss, ...)
    #[error("bus transfer failed")]
    Bus,

    /// The byte sink refused or truncated a write
    #[error("telemetry sink write failed")]
    SinkWrite,

    /// A driver was asked to run with an unusable setting
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// Result type for hardware operations
pub type HalResult<T> = Result<T, HalError>;
