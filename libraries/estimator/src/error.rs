use std::fmt;
use thiserror::Error;

/// Primary error type for the estimator crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    /// Numerical computation produced NaN or infinite values
    #[error("Numerical error in {filter}: {message}")]
    NumericalError {
        /// Detailed error message
        message: String,
        /// Filter that failed
        filter: FilterType,
    },

    /// A matrix that must be inverted is singular
    #[error("Matrix operation error: {message} ({operation})")]
    MatrixError {
        /// Detailed error message
        message: String,
        /// Operation that failed
        operation: String,
    },

    /// Construction parameters are unusable
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Detailed error message
        message: String,
        /// Configuration parameter that caused the error
        parameter: Option<String>,
    },

    /// Input or seed value is NaN or infinite
    #[error("Invalid state detected in {component}: {message}")]
    InvalidState {
        /// Detailed error message
        message: String,
        /// Component where invalid state was detected
        component: String,
    },
}

/// Estimators that can report errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Linear Kalman filter
    Kalman,
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterType::Kalman => write!(f, "Kalman filter"),
        }
    }
}

/// Helper functions for creating common errors
pub mod helpers {
    use super::*;

    /// Create a numerical error
    pub fn numerical_error(message: impl Into<String>, filter: FilterType) -> EstimatorError {
        EstimatorError::NumericalError {
            message: message.into(),
            filter,
        }
    }

    /// Create a matrix error
    pub fn matrix_error(message: impl Into<String>, operation: impl Into<String>) -> EstimatorError {
        EstimatorError::MatrixError {
            message: message.into(),
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(
        message: impl Into<String>,
        parameter: Option<impl Into<String>>,
    ) -> EstimatorError {
        EstimatorError::ConfigurationError {
            message: message.into(),
            parameter: parameter.map(|p| p.into()),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>, component: impl Into<String>) -> EstimatorError {
        EstimatorError::InvalidState {
            message: message.into(),
            component: component.into(),
        }
    }

    /// Check that a time step is usable
    pub fn check_time_delta(dt: f32) -> Result<(), EstimatorError> {
        if dt <= 0.0 || !dt.is_finite() {
            Err(config_error(
                format!("Invalid time step: {}", dt),
                Some("dt"),
            ))
        } else {
            Ok(())
        }
    }

    /// Check that every element of a slice is finite
    pub fn check_finite(values: &[f32], name: &str, component: &str) -> Result<(), EstimatorError> {
        if values.iter().any(|v| !v.is_finite()) {
            Err(invalid_state(
                format!("{} contains NaN or infinite values", name),
                component,
            ))
        } else {
            Ok(())
        }
    }
}

/// Type alias for Result with EstimatorError
pub type EstimatorResult<T> = Result<T, EstimatorError>;
