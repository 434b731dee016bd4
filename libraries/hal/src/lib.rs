#![no_std]
extern crate nalgebra;

mod clock;
mod encoder;
mod error;
mod imu;
mod telemetry;
mod types;

pub use clock::*;
pub use encoder::*;
pub use error::*;
pub use imu::*;
pub use telemetry::*;
pub use types::*;
