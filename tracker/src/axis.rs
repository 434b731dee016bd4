use core::f32::consts::TAU;
use core::fmt;

use serde::Deserialize;

use crate::config::AxisConfig;

/// Upper bound on tracked degrees of freedom
pub const MAX_AXES: usize = 3;

/// Physical degree of freedom of the boom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisId {
    Pitch,
    Yaw,
    Roll,
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisId::Pitch => write!(f, "pitch"),
            AxisId::Yaw => write!(f, "yaw"),
            AxisId::Roll => write!(f, "roll"),
        }
    }
}

/// Geometry of one encoder-instrumented axis.
///
/// Converts encoder counts into the arc length travelled by the boom end.
/// One boom revolution is `cpr * gear` counts.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisChannel {
    id: AxisId,
    cpr: u32,
    gear: f32,
    radius: f32,
    position_offset: f32,
    calibration_offset: i32,
    index_pulse: bool,
}

impl AxisChannel {
    pub fn new(id: AxisId, cpr: u32, gear: f32, radius: f32) -> Self {
        AxisChannel {
            id,
            cpr,
            gear,
            radius,
            position_offset: 0.0,
            calibration_offset: 0,
            index_pulse: false,
        }
    }

    /// Reference the encoder with an index pulse that loads `offset` counts
    pub fn with_index_pulse(mut self, offset: i32) -> Self {
        self.index_pulse = true;
        self.calibration_offset = offset;
        self
    }

    /// Constant added to every converted position, in metres
    pub fn with_position_offset(mut self, offset: f32) -> Self {
        self.position_offset = offset;
        self
    }

    pub fn from_config(config: &AxisConfig) -> Self {
        AxisChannel {
            id: config.id,
            cpr: config.cpr,
            gear: config.gear,
            radius: config.radius,
            position_offset: config.position_offset,
            calibration_offset: config.calibration_offset,
            index_pulse: config.index_pulse,
        }
    }

    pub fn id(&self) -> AxisId {
        self.id
    }

    pub fn cpr(&self) -> u32 {
        self.cpr
    }

    pub fn gear(&self) -> f32 {
        self.gear
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Count loaded into the encoder when the axis is referenced
    pub fn calibration_offset(&self) -> i32 {
        self.calibration_offset
    }

    pub fn has_index_pulse(&self) -> bool {
        self.index_pulse
    }

    /// Encoder counts per full revolution of the boom
    pub fn counts_per_revolution(&self) -> f32 {
        self.cpr as f32 * self.gear
    }

    /// Boom angle in radians
    pub fn counts_to_angle(&self, counts: f32) -> f32 {
        counts / self.counts_per_revolution() * TAU
    }

    /// Arc-length position of the boom end in metres
    pub fn counts_to_position(&self, counts: f32) -> f32 {
        self.counts_to_angle(counts) * self.radius + self.position_offset
    }

    /// Scale a count rate (counts/s, counts/s²) to m/s or m/s²
    pub fn counts_to_linear(&self, rate: f32) -> f32 {
        self.counts_to_angle(rate) * self.radius
    }

    /// Inverse of [`AxisChannel::counts_to_position`]
    pub fn position_to_counts(&self, position: f32) -> f32 {
        (position - self.position_offset) / (TAU * self.radius) * self.counts_per_revolution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pitch() -> AxisChannel {
        AxisChannel::new(AxisId::Pitch, 4096, 4.0, 2.475)
    }

    #[test]
    fn test_full_revolution_is_circumference() {
        let axis = pitch();
        assert_relative_eq!(axis.counts_per_revolution(), 16_384.0);
        assert_relative_eq!(axis.counts_to_angle(16_384.0), TAU);
        assert_relative_eq!(
            axis.counts_to_position(16_384.0),
            TAU * 2.475,
            max_relative = 1.0e-6
        );
    }

    #[test]
    fn test_quarter_turn_of_encoder_shaft() {
        // one encoder revolution is a quarter boom revolution with a 4:1 gear
        let axis = pitch();
        assert_relative_eq!(
            axis.counts_to_position(4096.0),
            TAU * 2.475 / 4.0,
            max_relative = 1.0e-6
        );
    }

    #[test]
    fn test_offset_applies_to_position_only() {
        let axis = pitch().with_position_offset(0.5);
        assert_relative_eq!(axis.counts_to_position(0.0), 0.5);
        assert_relative_eq!(axis.counts_to_linear(0.0), 0.0);
        assert_relative_eq!(
            axis.position_to_counts(axis.counts_to_position(1234.0)),
            1234.0,
            max_relative = 1.0e-5
        );
    }

    #[test]
    fn test_index_pulse_builder() {
        let axis = pitch().with_index_pulse(671);
        assert!(axis.has_index_pulse());
        assert_eq!(axis.calibration_offset(), 671);
        assert_eq!(axis.id().to_string(), "pitch");
    }
}
