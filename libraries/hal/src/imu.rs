//! Inertial sensor interfaces
use crate::error::HalResult;
use crate::types::Vector3d;

/// Vendor-specific accelerometer backend
///
/// This is the raw capability a chip driver provides: bring-up, raw sample
/// access and the conversion constant for the configured full-scale range.
/// Bias handling lives on top of it (see `InertialSensor`).
pub trait ImuBackend {
    /// Power up and configure the device (range, output data rate, filters)
    fn init(&mut self) -> HalResult<()>;

    /// Read one raw accelerometer sample (x, y, z) in device LSB
    fn read_raw_accel(&mut self) -> HalResult<[i16; 3]>;

    /// Acceleration represented by one LSB, in m/s²
    fn accel_scale(&self) -> f32;

    /// Die temperature in Celsius
    fn read_temperature(&mut self) -> HalResult<f32>;

    /// Convert a raw sample to m/s²
    fn raw_to_accel(&self, raw: [i16; 3]) -> Vector3d {
        let scale = self.accel_scale();
        Vector3d::new(
            raw[0] as f32 * scale,
            raw[1] as f32 * scale,
            raw[2] as f32 * scale,
        )
    }
}

/// Calibrated inertial source consumed by the estimators
pub trait InertialSensor {
    /// Bring the device up and run the stationary bias calibration
    ///
    /// Blocks until done. The platform must be motionless.
    fn initialize(&mut self) -> HalResult<()>;

    /// Bias-corrected acceleration in the boom's world frame (m/s²)
    fn read_acceleration(&mut self) -> HalResult<Vector3d>;

    /// Sensor temperature in Celsius
    fn read_temperature(&mut self) -> HalResult<f32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct HalfLsb;

    impl ImuBackend for HalfLsb {
        fn init(&mut self) -> HalResult<()> {
            Ok(())
        }

        fn read_raw_accel(&mut self) -> HalResult<[i16; 3]> {
            Ok([2, -4, 0])
        }

        fn accel_scale(&self) -> f32 {
            0.5
        }

        fn read_temperature(&mut self) -> HalResult<f32> {
            Ok(0.0)
        }
    }

    #[test]
    fn test_raw_to_accel_scales_each_axis() {
        let mut imu = HalfLsb;
        let raw = imu.read_raw_accel().unwrap();
        assert_eq!(imu.raw_to_accel(raw), Vector3d::new(1.0, -2.0, 0.0));
    }
}
