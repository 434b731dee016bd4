//! # Estimator - encoder and inertial state estimation
//!
//! Numerical building blocks for tracking a rotating axis from a quantized
//! encoder count and an accelerometer.
//!
//! ## Features
//!
//! - Critically-damped PLL that turns raw integer counts into continuous
//!   position and a low-noise velocity
//! - Generic fixed-dimension linear Kalman filter (`N` states, `M`
//!   measurements) with optional scalar control input
//! - Kinematic models that build `F`, `B` and `Q` from a time step
//!
//! ## Platform Support
//!
//! Built against `std`: errors carry owned messages and the PLL relies on
//! `f32::floor`. The `hal` crate stays `no_std`.

pub mod error;
pub mod kalman;
pub mod models;
pub mod pll;

pub use error::{EstimatorError, EstimatorResult, FilterType};
pub use kalman::{KalmanFilter, Mat, Vector};
pub use models::{AccelerationInputModel, ConstantAccelerationModel, MotionModel};
pub use pll::Pll;
