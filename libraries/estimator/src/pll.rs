// Encoder phase-locked loop for position and velocity tracking
use crate::error::{helpers, EstimatorResult};

/// Second-order PI tracking loop on raw encoder counts.
///
/// Position is kept in (fractional) counts and velocity in counts per second.
/// The loop gains are derived from a single bandwidth parameter so that the
/// loop is critically damped:
///
/// - `Kp = 2 * bandwidth`
/// - `Ki = Kp² / 4`
///
/// [`Pll::update`] must be called at the fixed period `dt` given at
/// construction. Stability needs `dt * bandwidth` well below 1; this is not
/// checked at runtime.
#[derive(Debug, Clone)]
pub struct Pll {
    /// Estimated position in counts
    position: f32,

    /// Estimated velocity in counts per second
    velocity: f32,

    dt: f32,
    bandwidth: f32,
    kp: f32,
    ki: f32,
}

impl Pll {
    /// Create a tracker for a loop period `dt` (seconds) and a `bandwidth` in rad/s
    pub fn new(dt: f32, bandwidth: f32) -> EstimatorResult<Self> {
        helpers::check_time_delta(dt)?;
        if bandwidth <= 0.0 || !bandwidth.is_finite() {
            return Err(helpers::config_error(
                format!("PLL bandwidth must be positive, got {}", bandwidth),
                Some("bandwidth"),
            ));
        }

        let kp = 2.0 * bandwidth;
        let ki = 0.25 * (kp * kp);

        Ok(Self {
            position: 0.0,
            velocity: 0.0,
            dt,
            bandwidth,
            kp,
            ki,
        })
    }

    /// Advance the loop by one period using the latest raw count.
    pub fn update(&mut self, raw_count: i32) {
        // free-running prediction
        self.position += self.dt * self.velocity;

        // phase error against the predicted position, not the previous count
        let error = raw_count.wrapping_sub(self.position.floor() as i32) as f32;

        self.position += self.dt * self.kp * error;
        self.velocity += self.dt * self.ki * error;
    }

    /// Lock the loop onto a known count with zero velocity
    pub fn seed(&mut self, count: i32) {
        self.position = count as f32;
        self.velocity = 0.0;
    }

    /// Estimated position in counts
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Estimated velocity in counts per second
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn bandwidth(&self) -> f32 {
        self.bandwidth
    }

    pub fn kp(&self) -> f32 {
        self.kp
    }

    pub fn ki(&self) -> f32 {
        self.ki
    }
}
