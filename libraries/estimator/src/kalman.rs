use crate::error::{helpers, EstimatorResult, FilterType};
use crate::models::MotionModel;
use nalgebra as na;

/// Fixed-size matrix shorthand
pub type Mat<const R: usize, const C: usize> = na::SMatrix<f32, R, C>;

/// Fixed-size column vector shorthand
pub type Vector<const N: usize> = na::SVector<f32, N>;

/// Linear Kalman filter with `N` states and `M` measurements.
///
/// All model matrices are fixed at construction; only the state `x` and the
/// covariance `P` change during [`KalmanFilter::update`]. An optional control
/// column `B` lets a scalar input (e.g. measured acceleration) drive the
/// prediction.
///
/// The covariance correction uses the direct form `P ← P − K·H·P`, not the
/// Joseph form.
#[derive(Debug, Clone)]
pub struct KalmanFilter<const N: usize, const M: usize> {
    /// State estimate
    x: Vector<N>,

    /// State covariance
    p: Mat<N, N>,

    /// State transition
    f: Mat<N, N>,

    /// Control column for a scalar input
    b: Option<Vector<N>>,

    /// Process noise covariance
    q: Mat<N, N>,

    /// Measurement model
    h: Mat<M, N>,

    /// Measurement noise covariance
    r: Mat<M, M>,
}

impl<const N: usize, const M: usize> KalmanFilter<N, M> {
    /// Create a filter from explicit matrices.
    ///
    /// `R` must be finite with a strictly positive diagonal and invertible,
    /// so the innovation covariance can never become singular through it.
    pub fn new(
        f: Mat<N, N>,
        q: Mat<N, N>,
        h: Mat<M, N>,
        r: Mat<M, M>,
        x0: Vector<N>,
        p0: Mat<N, N>,
    ) -> EstimatorResult<Self> {
        helpers::check_finite(f.as_slice(), "transition matrix", "Kalman filter")?;
        helpers::check_finite(q.as_slice(), "process noise", "Kalman filter")?;
        helpers::check_finite(h.as_slice(), "measurement matrix", "Kalman filter")?;
        helpers::check_finite(r.as_slice(), "measurement noise", "Kalman filter")?;
        helpers::check_finite(x0.as_slice(), "initial state", "Kalman filter")?;
        helpers::check_finite(p0.as_slice(), "initial covariance", "Kalman filter")?;

        if (0..M).any(|i| r[(i, i)] <= 0.0) {
            return Err(helpers::config_error(
                "measurement noise covariance must have a positive diagonal",
                Some("R"),
            ));
        }
        if r.try_inverse().is_none() {
            return Err(helpers::matrix_error(
                "measurement noise covariance is singular",
                "R inverse",
            ));
        }

        Ok(Self {
            x: x0,
            p: p0,
            f,
            b: None,
            q,
            h,
            r,
        })
    }

    /// Create a filter whose `F`, `Q` and `B` come from a motion model
    pub fn from_model(
        model: &impl MotionModel<N>,
        h: Mat<M, N>,
        r: Mat<M, M>,
        x0: Vector<N>,
        p0: Mat<N, N>,
    ) -> EstimatorResult<Self> {
        let mut filter = Self::new(model.transition(), model.process_noise(), h, r, x0, p0)?;
        filter.b = model.control();
        Ok(filter)
    }

    /// Attach a control column `B` for a scalar input
    pub fn with_control(mut self, b: Vector<N>) -> Self {
        self.b = Some(b);
        self
    }

    /// Run one predict/correct cycle.
    ///
    /// `u` is ignored when the filter has no control column. On error the
    /// filter keeps its previous state and covariance.
    pub fn update(&mut self, z: &Vector<M>, u: Option<f32>) -> EstimatorResult<()> {
        // predict
        let mut x = self.f * self.x;
        if let (Some(b), Some(u)) = (self.b, u) {
            x += b * u;
        }
        let p = self.f * self.p * self.f.transpose() + self.q;

        // innovation covariance and gain
        let ht = self.h.transpose();
        let s = self.h * p * ht + self.r;
        let s_inv = s.try_inverse().ok_or_else(|| {
            helpers::matrix_error("innovation covariance is singular", "S inverse")
        })?;
        let k = p * ht * s_inv;

        // correct
        let innovation = z - self.h * x;
        let x = x + k * innovation;
        let p = p - k * self.h * p;

        if x.iter().chain(p.iter()).any(|v| !v.is_finite()) {
            return Err(helpers::numerical_error(
                "update produced NaN or infinite values",
                FilterType::Kalman,
            ));
        }

        self.x = x;
        self.p = p;
        Ok(())
    }

    /// Snapshot of the current state estimate
    pub fn state(&self) -> Vector<N> {
        self.x
    }

    /// Current state covariance
    pub fn covariance(&self) -> &Mat<N, N> {
        &self.p
    }

    /// Overwrite the state estimate, keeping the covariance
    pub fn set_state(&mut self, x: Vector<N>) -> EstimatorResult<()> {
        helpers::check_finite(x.as_slice(), "state", "Kalman filter")?;
        self.x = x;
        Ok(())
    }

    pub fn transition(&self) -> &Mat<N, N> {
        &self.f
    }

    pub fn control(&self) -> Option<&Vector<N>> {
        self.b.as_ref()
    }

    pub fn process_noise(&self) -> &Mat<N, N> {
        &self.q
    }

    pub fn observation(&self) -> &Mat<M, N> {
        &self.h
    }

    pub fn measurement_noise(&self) -> &Mat<M, M> {
        &self.r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccelerationInputModel, ConstantAccelerationModel};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn accel_input_filter(p0: f32) -> KalmanFilter<2, 1> {
        let model = AccelerationInputModel::new(1.0e-3, 2.0e-4).unwrap();
        KalmanFilter::from_model(
            &model,
            Mat::<1, 2>::new(1.0, 0.0),
            Mat::<1, 1>::new(1.0e-4),
            Vector::<2>::zeros(),
            Mat::<2, 2>::identity() * p0,
        )
        .unwrap()
    }

    fn constant_accel_filter(p0: f32) -> KalmanFilter<3, 2> {
        let model = ConstantAccelerationModel::new(2.0e-3, 5.0).unwrap();
        KalmanFilter::from_model(
            &model,
            Mat::<2, 3>::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            Mat::<2, 2>::new(1.0e-12, 0.0, 0.0, 2.0e-3),
            Vector::<3>::zeros(),
            Mat::<3, 3>::identity() * p0,
        )
        .unwrap()
    }

    #[test]
    fn test_two_state_steady_state() {
        let mut kf = accel_input_filter(1.0);
        let z = Vector::<1>::new(15.55);
        for _ in 0..2_000 {
            kf.update(&z, Some(0.0)).unwrap();
        }

        let x = kf.state();
        assert_abs_diff_eq!(x[0], 15.55, epsilon = 1.0e-3);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1.0e-2);
    }

    #[test]
    fn test_three_state_steady_state() {
        let mut kf = constant_accel_filter(1.0);
        let z = Vector::<2>::new(15.55, 0.0);
        for _ in 0..3_000 {
            kf.update(&z, None).unwrap();
        }

        let x = kf.state();
        assert_abs_diff_eq!(x[0], 15.55, epsilon = 1.0e-3);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1.0e-2);
        assert_abs_diff_eq!(x[2], 0.0, epsilon = 5.0e-2);
    }

    #[test]
    fn test_covariance_forgets_initial_value() {
        let mut small = accel_input_filter(1.0);
        let mut large = accel_input_filter(10.0);
        let z = Vector::<1>::new(2.0);
        for _ in 0..2_000 {
            small.update(&z, Some(0.0)).unwrap();
            large.update(&z, Some(0.0)).unwrap();
        }

        let (a, b) = (small.covariance(), large.covariance());
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(a[(i, j)], b[(i, j)], max_relative = 1.0e-2);
            }
        }
    }

    #[test]
    fn test_three_state_covariance_forgets_initial_value() {
        let mut small = constant_accel_filter(1.0);
        let mut large = constant_accel_filter(10.0);
        let z = Vector::<2>::new(2.0, 0.0);
        for _ in 0..20_000 {
            small.update(&z, None).unwrap();
            large.update(&z, None).unwrap();
        }

        // position variance sits near the 1e-12 measurement noise
        let (a, b) = (small.covariance(), large.covariance());
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(a[(i, j)], b[(i, j)], epsilon = 1.0e-6, max_relative = 1.0e-2);
            }
        }
        assert!(a[(2, 2)] > 0.0);
    }

    #[test]
    fn test_zero_innovation_leaves_prediction_unchanged() {
        let mut kf = constant_accel_filter(1.0);
        let x0 = Vector::<3>::new(1.0, 0.5, -0.2);
        kf.set_state(x0).unwrap();

        let predicted = kf.transition() * x0;
        let z = kf.observation() * predicted;
        kf.update(&z, None).unwrap();

        let x = kf.state();
        for i in 0..3 {
            assert_abs_diff_eq!(x[i], predicted[i], epsilon = 1.0e-6);
        }
    }

    #[test]
    fn test_control_input_drives_prediction() {
        let mut kf = accel_input_filter(1.0);
        // measurement follows the integrated input exactly
        let dt = 1.0e-3f32;
        let accel = 2.0f32;
        for i in 1..=1_000 {
            let t = i as f32 * dt;
            let z = Vector::<1>::new(0.5 * accel * t * t);
            kf.update(&z, Some(accel)).unwrap();
        }

        assert_abs_diff_eq!(kf.state()[1], accel * 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_rejects_degenerate_measurement_noise() {
        let model = AccelerationInputModel::new(1.0e-3, 2.0e-4).unwrap();
        let result = KalmanFilter::from_model(
            &model,
            Mat::<1, 2>::new(1.0, 0.0),
            Mat::<1, 1>::new(0.0),
            Vector::<2>::zeros(),
            Mat::<2, 2>::identity(),
        );
        assert!(result.is_err(), "zero R should be rejected");

        let singular = KalmanFilter::<2, 2>::new(
            Mat::<2, 2>::identity(),
            Mat::<2, 2>::zeros(),
            Mat::<2, 2>::identity(),
            Mat::<2, 2>::new(1.0, 1.0, 1.0, 1.0),
            Vector::<2>::zeros(),
            Mat::<2, 2>::identity(),
        );
        assert!(singular.is_err(), "singular R should be rejected");
    }

    #[test]
    fn test_non_finite_measurement_fails_fast() {
        let mut kf = accel_input_filter(1.0);
        kf.update(&Vector::<1>::new(1.0), Some(0.0)).unwrap();
        let before = kf.state();

        let result = kf.update(&Vector::<1>::new(f32::NAN), Some(0.0));
        assert!(result.is_err());
        assert_eq!(kf.state(), before, "state must not be touched on error");
    }
}
