//! Tracker configuration
//!
//! Loaded once at startup from TOML. Every field has a default equal to the
//! constants the boom firmware was built with, so an empty file (or no file)
//! yields a working pitch/yaw setup.
//!
//! ```toml
//! [scheduler]
//! fast_hz = 20000
//! fusion_hz = 1000
//! telemetry_hz = 500
//! calibration_timeout_ms = 5000
//!
//! [[axes]]
//! id = "pitch"
//! radius = 2.475
//! accel_component = "y"
//! index_pulse = true
//! calibration_offset = 671
//!
//! [axes.kalman]
//! mode = "accel_input"
//! accel_noise = 2e-4
//! position_noise = 1e-4
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::axis::{AxisId, MAX_AXES};
use crate::error::{TrackerError, TrackerResult};
use crate::telemetry::frame_len;

/// PLL loop gain product above which tracking is considered marginal
const MAX_PLL_GAIN_PRODUCT: f32 = 0.1;

/// UART bits per byte with one start and one stop bit
const BITS_PER_BYTE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub scheduler: SchedulerConfig,
    pub imu: ImuConfig,
    pub telemetry: TelemetryConfig,
    pub axes: Vec<AxisConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Task A rate (PLL)
    pub fast_hz: u32,
    /// Task B rate (Kalman)
    pub fusion_hz: u32,
    /// Task C rate (telemetry)
    pub telemetry_hz: u32,
    /// Give up waiting for index pulses after this long; wait forever if unset
    pub calibration_timeout_ms: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            fast_hz: 20_000,
            fusion_hz: 1_000,
            telemetry_hz: 500,
            calibration_timeout_ms: None,
        }
    }
}

impl SchedulerConfig {
    pub fn fast_dt(&self) -> f32 {
        1.0 / self.fast_hz as f32
    }

    pub fn fusion_dt(&self) -> f32 {
        1.0 / self.fusion_hz as f32
    }

    /// Fast ticks per fusion cycle
    pub fn fusion_divider(&self) -> u32 {
        self.fast_hz / self.fusion_hz
    }

    /// Fusion cycles per telemetry frame
    pub fn telemetry_divider(&self) -> u32 {
        self.fusion_hz / self.telemetry_hz
    }

    /// Rates must be non-zero and each slower rate must divide the faster
    /// one, so the fusion period matches the `dt` the filters are built with.
    pub fn validate(&self) -> TrackerResult<()> {
        if self.fast_hz == 0 || self.fusion_hz == 0 || self.telemetry_hz == 0 {
            return Err(TrackerError::config("scheduler", "rates must be non-zero"));
        }
        if self.fast_hz % self.fusion_hz != 0 {
            return Err(TrackerError::config(
                "scheduler.fusion_hz",
                format!(
                    "{} Hz does not divide fast rate {} Hz",
                    self.fusion_hz, self.fast_hz
                ),
            ));
        }
        if self.fusion_hz % self.telemetry_hz != 0 {
            return Err(TrackerError::config(
                "scheduler.telemetry_hz",
                format!(
                    "{} Hz does not divide fusion rate {} Hz",
                    self.telemetry_hz, self.fusion_hz
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImuConfig {
    /// Raw samples averaged for the stationary bias estimate
    pub bias_samples: u32,
}

impl Default for ImuConfig {
    fn default() -> Self {
        ImuConfig { bias_samples: 1_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Serial link rate to the host
    pub baud_rate: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            baud_rate: 1_000_000,
        }
    }
}

/// Accelerometer axis aligned with an encoder axis' direction of travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccelComponent {
    X,
    Y,
    Z,
}

impl AccelComponent {
    pub fn index(self) -> usize {
        match self {
            AccelComponent::X => 0,
            AccelComponent::Y => 1,
            AccelComponent::Z => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AxisConfig {
    pub id: AxisId,
    #[serde(default = "default_cpr")]
    pub cpr: u32,
    #[serde(default = "default_gear")]
    pub gear: f32,
    /// Pivot to boom-end distance in metres
    pub radius: f32,
    #[serde(default)]
    pub position_offset: f32,
    /// Encoder is referenced by a hardware index pulse; zeroed at boot otherwise
    #[serde(default)]
    pub index_pulse: bool,
    #[serde(default)]
    pub calibration_offset: i32,
    #[serde(default = "default_pll_bandwidth")]
    pub pll_bandwidth: f32,
    pub accel_component: AccelComponent,
    #[serde(default)]
    pub kalman: KalmanConfig,
}

fn default_cpr() -> u32 {
    4096
}

fn default_gear() -> f32 {
    4.0
}

fn default_pll_bandwidth() -> f32 {
    500.0
}

impl AxisConfig {
    pub fn yaw() -> Self {
        AxisConfig {
            id: AxisId::Yaw,
            cpr: default_cpr(),
            gear: default_gear(),
            radius: 2.558,
            position_offset: 0.0,
            index_pulse: false,
            calibration_offset: 0,
            pll_bandwidth: default_pll_bandwidth(),
            accel_component: AccelComponent::X,
            kalman: KalmanConfig::default(),
        }
    }

    pub fn pitch() -> Self {
        AxisConfig {
            id: AxisId::Pitch,
            radius: 2.475,
            index_pulse: true,
            calibration_offset: 671,
            accel_component: AccelComponent::Y,
            ..Self::yaw()
        }
    }
}

/// How the accelerometer enters the Kalman filter
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum KalmanConfig {
    /// Two states, acceleration as control input
    AccelInput {
        /// Accelerometer noise variance driving the process noise
        accel_noise: f32,
        /// Position measurement variance
        position_noise: f32,
    },
    /// Three states, acceleration as a second measurement
    ConstantAcceleration {
        /// Expected peak jerk in m/s³
        jerk: f32,
        position_noise: f32,
        /// Acceleration measurement variance
        accel_noise: f32,
    },
}

impl Default for KalmanConfig {
    fn default() -> Self {
        KalmanConfig::AccelInput {
            accel_noise: 2.0e-4,
            position_noise: 1.0e-4,
        }
    }
}

impl KalmanConfig {
    fn noise_values(&self) -> Vec<(&'static str, f32)> {
        match *self {
            KalmanConfig::AccelInput {
                accel_noise,
                position_noise,
            } => vec![
                ("accel_noise", accel_noise),
                ("position_noise", position_noise),
            ],
            KalmanConfig::ConstantAcceleration {
                jerk,
                position_noise,
                accel_noise,
            } => vec![
                ("jerk", jerk),
                ("position_noise", position_noise),
                ("accel_noise", accel_noise),
            ],
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            scheduler: SchedulerConfig::default(),
            imu: ImuConfig::default(),
            telemetry: TelemetryConfig::default(),
            axes: vec![AxisConfig::yaw(), AxisConfig::pitch()],
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(contents: &str) -> TrackerResult<Self> {
        basic_toml::from_str(contents).map_err(|e| TrackerError::ConfigLoad {
            path: "<string>".into(),
            message: e.to_string(),
        })
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref();
        let load_error = |message: String| TrackerError::ConfigLoad {
            path: path.display().to_string(),
            message,
        };

        let contents = fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let config: TrackerConfig =
            basic_toml::from_str(&contents).map_err(|e| load_error(e.to_string()))?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject configurations the estimators cannot run with.
    ///
    /// A PLL with `dt * bandwidth` close to 1 is accepted with a warning.
    pub fn validate(&self) -> TrackerResult<()> {
        let s = &self.scheduler;
        s.validate()?;
        if self.imu.bias_samples == 0 {
            return Err(TrackerError::config("imu.bias_samples", "must be non-zero"));
        }

        if self.axes.is_empty() || self.axes.len() > MAX_AXES {
            return Err(TrackerError::config(
                "axes",
                format!("expected 1 to {} axes, got {}", MAX_AXES, self.axes.len()),
            ));
        }

        let mut seen = HashSet::new();
        for axis in &self.axes {
            if !seen.insert(axis.id) {
                return Err(TrackerError::config(
                    format!("axes.{}", axis.id),
                    "duplicate axis id",
                ));
            }
            self.validate_axis(axis)?;
        }

        let bits_per_second =
            frame_len(self.axes.len()) as u32 * BITS_PER_BYTE * s.telemetry_hz;
        if bits_per_second > self.telemetry.baud_rate {
            warn!(
                "telemetry needs {} bit/s but the link runs at {} baud; frames will back up",
                bits_per_second, self.telemetry.baud_rate
            );
        }

        Ok(())
    }

    fn validate_axis(&self, axis: &AxisConfig) -> TrackerResult<()> {
        let field = |name: &str| format!("axes.{}.{}", axis.id, name);

        if axis.cpr == 0 {
            return Err(TrackerError::config(field("cpr"), "must be positive"));
        }
        for (name, value) in [
            ("gear", axis.gear),
            ("radius", axis.radius),
            ("pll_bandwidth", axis.pll_bandwidth),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(TrackerError::config(
                    field(name),
                    format!("must be positive, got {}", value),
                ));
            }
        }
        for (name, value) in axis.kalman.noise_values() {
            if !(value > 0.0) || !value.is_finite() {
                return Err(TrackerError::config(
                    field(&format!("kalman.{}", name)),
                    format!("must be positive, got {}", value),
                ));
            }
        }

        let gain_product = self.scheduler.fast_dt() * axis.pll_bandwidth;
        if gain_product > MAX_PLL_GAIN_PRODUCT {
            warn!(
                "{} PLL: dt * bandwidth = {:.3} is not well below 1, tracking may be unstable",
                axis.id, gain_product
            );
        }

        Ok(())
    }

    pub fn axis(&self, id: AxisId) -> Option<&AxisConfig> {
        self.axes.iter().find(|axis| axis.id == id)
    }
}
