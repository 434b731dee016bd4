use estimator::{
    AccelerationInputModel, ConstantAccelerationModel, EstimatorResult, KalmanFilter, Mat, Pll,
    Vector,
};
use hal::Vector3d;

use crate::axis::{AxisChannel, AxisId};
use crate::config::{AccelComponent, AxisConfig, KalmanConfig, SchedulerConfig};
use crate::error::TrackerResult;
use crate::telemetry::AxisSample;

/// Fused kinematic state of one axis in metres, m/s and m/s²
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FusedState {
    pub position: f32,
    pub velocity: f32,
    pub acceleration: f32,
}

/// Kalman filter variant selected by the axis configuration
#[derive(Debug, Clone)]
pub enum AxisFilter {
    /// `[position, velocity]`, acceleration drives the prediction
    AccelInput {
        filter: KalmanFilter<2, 1>,
        last_accel: f32,
    },
    /// `[position, velocity, acceleration]`, acceleration is measured
    ConstantAcceleration(KalmanFilter<3, 2>),
}

impl AxisFilter {
    pub fn from_config(config: &KalmanConfig, dt: f32) -> EstimatorResult<Self> {
        match *config {
            KalmanConfig::AccelInput {
                accel_noise,
                position_noise,
            } => {
                let model = AccelerationInputModel::new(dt, accel_noise)?;
                let filter = KalmanFilter::from_model(
                    &model,
                    Mat::<1, 2>::new(1.0, 0.0),
                    Mat::<1, 1>::new(position_noise),
                    Vector::<2>::zeros(),
                    Mat::<2, 2>::identity(),
                )?;
                Ok(AxisFilter::AccelInput {
                    filter,
                    last_accel: 0.0,
                })
            }
            KalmanConfig::ConstantAcceleration {
                jerk,
                position_noise,
                accel_noise,
            } => {
                let model = ConstantAccelerationModel::new(dt, jerk)?;
                let filter = KalmanFilter::from_model(
                    &model,
                    Mat::<2, 3>::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0),
                    Mat::<2, 2>::new(position_noise, 0.0, 0.0, accel_noise),
                    Vector::<3>::zeros(),
                    Mat::<3, 3>::identity(),
                )?;
                Ok(AxisFilter::ConstantAcceleration(filter))
            }
        }
    }

    /// One predict/correct cycle with a position and an acceleration sample
    pub fn update(&mut self, position: f32, accel: f32) -> EstimatorResult<()> {
        match self {
            AxisFilter::AccelInput { filter, last_accel } => {
                filter.update(&Vector::<1>::new(position), Some(accel))?;
                *last_accel = accel;
                Ok(())
            }
            AxisFilter::ConstantAcceleration(filter) => {
                filter.update(&Vector::<2>::new(position, accel), None)
            }
        }
    }

    /// Start from rest at `position`
    pub fn seed(&mut self, position: f32) -> EstimatorResult<()> {
        match self {
            AxisFilter::AccelInput { filter, last_accel } => {
                *last_accel = 0.0;
                filter.set_state(Vector::<2>::new(position, 0.0))
            }
            AxisFilter::ConstantAcceleration(filter) => {
                filter.set_state(Vector::<3>::new(position, 0.0, 0.0))
            }
        }
    }

    pub fn state(&self) -> FusedState {
        match self {
            AxisFilter::AccelInput { filter, last_accel } => {
                let x = filter.state();
                FusedState {
                    position: x[0],
                    velocity: x[1],
                    acceleration: *last_accel,
                }
            }
            AxisFilter::ConstantAcceleration(filter) => {
                let x = filter.state();
                FusedState {
                    position: x[0],
                    velocity: x[1],
                    acceleration: x[2],
                }
            }
        }
    }
}

/// Everything estimated for one axis.
///
/// The PLL is written by the fast task only; the Kalman filter and the fused
/// snapshot by the fusion task only.
#[derive(Debug, Clone)]
pub struct AxisEstimator {
    channel: AxisChannel,
    accel_component: AccelComponent,
    pll: Pll,
    filter: AxisFilter,
    raw_count: i32,
    fused: FusedState,
}

impl AxisEstimator {
    pub fn new(config: &AxisConfig, scheduler: &SchedulerConfig) -> TrackerResult<Self> {
        Ok(AxisEstimator {
            channel: AxisChannel::from_config(config),
            accel_component: config.accel_component,
            pll: Pll::new(scheduler.fast_dt(), config.pll_bandwidth)?,
            filter: AxisFilter::from_config(&config.kalman, scheduler.fusion_dt())?,
            raw_count: 0,
            fused: FusedState::default(),
        })
    }

    /// Lock both estimators onto the current encoder count
    pub fn seed(&mut self, count: i32) -> TrackerResult<()> {
        self.raw_count = count;
        self.pll.seed(count);
        let position = self.channel.counts_to_position(count as f32);
        self.filter.seed(position)?;
        self.fused = self.filter.state();
        Ok(())
    }

    /// Fast task body: feed the latest raw count to the PLL
    #[inline]
    pub fn track(&mut self, count: i32) {
        self.raw_count = count;
        self.pll.update(count);
    }

    /// Fusion task body: PLL position plus the mapped accelerometer axis
    pub fn fuse(&mut self, accel: &Vector3d) -> TrackerResult<()> {
        let position = self.channel.counts_to_position(self.pll.position());
        let a = accel[self.accel_component.index()];
        self.filter.update(position, a)?;
        self.fused = self.filter.state();
        Ok(())
    }

    pub fn id(&self) -> AxisId {
        self.channel.id()
    }

    pub fn channel(&self) -> &AxisChannel {
        &self.channel
    }

    pub fn pll(&self) -> &Pll {
        &self.pll
    }

    pub fn filter(&self) -> &AxisFilter {
        &self.filter
    }

    pub fn raw_count(&self) -> i32 {
        self.raw_count
    }

    /// PLL position in metres
    pub fn tracked_position(&self) -> f32 {
        self.channel.counts_to_position(self.pll.position())
    }

    /// PLL velocity in m/s
    pub fn tracked_velocity(&self) -> f32 {
        self.channel.counts_to_linear(self.pll.velocity())
    }

    /// Snapshot written by the last completed fusion cycle
    pub fn fused(&self) -> FusedState {
        self.fused
    }

    pub fn sample(&self) -> AxisSample {
        AxisSample {
            count: self.raw_count,
            position: self.fused.position,
            velocity: self.fused.velocity,
            acceleration: self.fused.acceleration,
        }
    }
}
