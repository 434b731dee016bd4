use std::f64::consts::TAU;

use tracker::{AxisConfig, AxisId};

/// Seconds the boom stays still after power-up (IMU bias window)
pub const REST_DURATION: f64 = 0.3;

/// Sinusoidal swing of one boom axis
#[derive(Debug, Clone, Copy)]
pub struct Swing {
    /// Angle at rest in radians
    pub rest: f64,
    pub amplitude: f64,
    pub frequency_hz: f64,
}

impl Swing {
    pub fn angle(&self, t: f64) -> f64 {
        let s = (t - REST_DURATION).max(0.0);
        self.rest + self.amplitude * (TAU * self.frequency_hz * s).sin()
    }

    pub fn angular_acceleration(&self, t: f64) -> f64 {
        if t < REST_DURATION {
            return 0.0;
        }
        let w = TAU * self.frequency_hz;
        -self.amplitude * w * w * (w * (t - REST_DURATION)).sin()
    }
}

/// Simulated boom: one swing per configured axis
#[derive(Debug, Clone)]
pub struct BoomPlant {
    axes: Vec<PlantAxis>,
}

#[derive(Debug, Clone)]
pub struct PlantAxis {
    pub id: AxisId,
    pub swing: Swing,
    pub counts_per_radian: f64,
    pub radius: f64,
    pub accel_index: usize,
    /// Angle at which the index pulse fires, for axes that have one
    pub index_angle: Option<f64>,
}

impl BoomPlant {
    pub fn new(axes: &[AxisConfig]) -> Self {
        let axes = axes
            .iter()
            .map(|config| {
                let counts_per_radian = config.cpr as f64 * config.gear as f64 / TAU;
                let swing = match config.id {
                    // starts below the index so the first swing crosses it
                    AxisId::Pitch => Swing {
                        rest: -0.1,
                        amplitude: 0.5,
                        frequency_hz: 0.5,
                    },
                    AxisId::Yaw => Swing {
                        rest: 0.0,
                        amplitude: 0.8,
                        frequency_hz: 0.2,
                    },
                    AxisId::Roll => Swing {
                        rest: 0.0,
                        amplitude: 0.2,
                        frequency_hz: 1.0,
                    },
                };
                PlantAxis {
                    id: config.id,
                    swing,
                    counts_per_radian,
                    radius: config.radius as f64,
                    accel_index: config.accel_component.index(),
                    index_angle: config
                        .index_pulse
                        .then(|| config.calibration_offset as f64 / counts_per_radian),
                }
            })
            .collect();
        BoomPlant { axes }
    }

    pub fn axes(&self) -> &[PlantAxis] {
        &self.axes
    }

    /// Encoder count of axis `i` relative to the calibrated zero
    pub fn true_counts(&self, i: usize, t: f64) -> i32 {
        let axis = &self.axes[i];
        (axis.swing.angle(t) * axis.counts_per_radian).floor() as i32
    }

    /// Tangential acceleration at the boom end, world frame, gravity excluded
    pub fn acceleration(&self, t: f64) -> [f64; 3] {
        let mut accel = [0.0; 3];
        for axis in &self.axes {
            accel[axis.accel_index] += axis.radius * axis.swing.angular_acceleration(t);
        }
        accel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_during_rest() {
        let plant = BoomPlant::new(&[AxisConfig::yaw(), AxisConfig::pitch()]);
        assert_eq!(plant.acceleration(0.1), [0.0; 3]);
        assert_eq!(plant.true_counts(0, 0.0), 0);
        assert!(plant.true_counts(1, 0.0) < 0);
    }

    #[test]
    fn test_pitch_swing_crosses_index() {
        let plant = BoomPlant::new(&[AxisConfig::pitch()]);
        let index = plant.axes()[0].index_angle.unwrap();
        let swing = plant.axes()[0].swing;
        assert!(swing.angle(0.0) < index);
        assert!(swing.angle(REST_DURATION + 0.5) > index);
    }
}
