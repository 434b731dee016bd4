use crate::error::{helpers, EstimatorResult};
use crate::kalman::{Mat, Vector};

/// Discrete kinematic model feeding a linear Kalman filter
///
/// Process noise is built from a scalar driving-noise variance projected
/// through the noise-shaping vector Γ: `Q = Γ·σ²·Γᵗ`.
pub trait MotionModel<const N: usize> {
    /// State transition matrix F
    fn transition(&self) -> Mat<N, N>;

    /// Noise-shaping vector Γ
    fn noise_shaping(&self) -> Vector<N>;

    /// Driving-noise variance σ²
    fn driving_noise(&self) -> f32;

    /// Control column B for a scalar input, if the model takes one
    fn control(&self) -> Option<Vector<N>> {
        None
    }

    /// Process noise covariance Q
    fn process_noise(&self) -> Mat<N, N> {
        let gamma = self.noise_shaping();
        gamma * self.driving_noise() * gamma.transpose()
    }

    /// Get the name of the model
    fn name(&self) -> &'static str;
}

/// Position/velocity model driven by measured acceleration.
///
/// State `[position, velocity]`, input `u = acceleration`:
///
/// ```text
/// position += velocity·dt + ½·u·dt²
/// velocity += u·dt
/// ```
///
/// The driving noise is the accelerometer noise variance, shaped by
/// `Γ = [dt, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct AccelerationInputModel {
    dt: f32,
    accel_noise: f32,
}

impl AccelerationInputModel {
    pub fn new(dt: f32, accel_noise: f32) -> EstimatorResult<Self> {
        helpers::check_time_delta(dt)?;
        check_noise(accel_noise, "accel_noise")?;
        Ok(Self { dt, accel_noise })
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }
}

impl MotionModel<2> for AccelerationInputModel {
    fn transition(&self) -> Mat<2, 2> {
        Mat::<2, 2>::new(1.0, self.dt, 0.0, 1.0)
    }

    fn noise_shaping(&self) -> Vector<2> {
        Vector::<2>::new(self.dt, 1.0)
    }

    fn driving_noise(&self) -> f32 {
        self.accel_noise
    }

    fn control(&self) -> Option<Vector<2>> {
        Some(Vector::<2>::new(0.5 * self.dt * self.dt, self.dt))
    }

    fn name(&self) -> &'static str {
        "acceleration input"
    }
}

/// Constant-acceleration model with acceleration as a state.
///
/// State `[position, velocity, acceleration]`. The unmodelled jerk drives
/// the process noise: `σ² = (jerk·dt)²`, shaped by `Γ = [½dt², dt, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct ConstantAccelerationModel {
    dt: f32,
    jerk: f32,
}

impl ConstantAccelerationModel {
    /// `jerk` is the expected peak jerk in units/s³
    pub fn new(dt: f32, jerk: f32) -> EstimatorResult<Self> {
        helpers::check_time_delta(dt)?;
        check_noise(jerk, "jerk")?;
        Ok(Self { dt, jerk })
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }
}

impl MotionModel<3> for ConstantAccelerationModel {
    fn transition(&self) -> Mat<3, 3> {
        let dt = self.dt;
        Mat::<3, 3>::new(
            1.0, dt, 0.5 * dt * dt,
            0.0, 1.0, dt,
            0.0, 0.0, 1.0,
        )
    }

    fn noise_shaping(&self) -> Vector<3> {
        Vector::<3>::new(0.5 * self.dt * self.dt, self.dt, 1.0)
    }

    fn driving_noise(&self) -> f32 {
        let j = self.jerk * self.dt;
        j * j
    }

    fn name(&self) -> &'static str {
        "constant acceleration"
    }
}

fn check_noise(value: f32, parameter: &str) -> EstimatorResult<()> {
    if value <= 0.0 || !value.is_finite() {
        Err(helpers::config_error(
            format!("{} must be positive, got {}", parameter, value),
            Some(parameter),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_acceleration_input_matrices() {
        let model = AccelerationInputModel::new(0.001, 2.0e-4).unwrap();
        let f = model.transition();
        assert_eq!(f[(0, 1)], 0.001);
        assert_eq!(f[(1, 0)], 0.0);

        let b = model.control().expect("model takes an input");
        assert_relative_eq!(b[0], 0.5e-6, max_relative = 1.0e-6);
        assert_relative_eq!(b[1], 0.001);

        let q = model.process_noise();
        assert_relative_eq!(q[(1, 1)], 2.0e-4);
        assert_relative_eq!(q[(0, 1)], 2.0e-4 * 0.001, max_relative = 1.0e-6);
        assert_relative_eq!(q[(0, 1)], q[(1, 0)], max_relative = 1.0e-6);
    }

    #[test]
    fn test_constant_acceleration_matrices() {
        let model = ConstantAccelerationModel::new(0.002, 5.0).unwrap();
        assert!(model.control().is_none());
        assert_eq!(model.name(), "constant acceleration");

        let f = model.transition();
        assert_relative_eq!(f[(0, 2)], 0.5 * 0.002 * 0.002, max_relative = 1.0e-6);
        assert_relative_eq!(f[(1, 2)], 0.002);

        // Q = Γ (j dt)² Γᵗ is rank one and symmetric
        let q = model.process_noise();
        assert_relative_eq!(q[(2, 2)], (5.0f32 * 0.002).powi(2));
        assert_relative_eq!(q.determinant(), 0.0, epsilon = 1.0e-20);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(q[(i, j)], q[(j, i)], max_relative = 1.0e-6);
            }
        }
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(AccelerationInputModel::new(0.0, 1.0).is_err());
        assert!(AccelerationInputModel::new(0.001, -1.0).is_err());
        assert!(ConstantAccelerationModel::new(0.001, 0.0).is_err());
    }
}
