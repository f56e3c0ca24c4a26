//! Drive configuration
//!
//! One [`DriveConfig`] describes a robot: geometry, speed limits, sensor
//! fusion, estimator and controller tuning. It is read from TOML once at
//! startup. Missing sections take their defaults; a section that is
//! present must be complete.
//!
//! ```toml
//! [geometry]
//! track_width = 0.55
//! wheelbase = 0.6
//! max_wheel_speed = 3.0
//!
//! [limits]
//! speed = 1.0
//! acceleration = 2.0
//! angular_speed = 1.0
//! angular_acceleration = 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use swerve_core::config::{GeometryConfig, SpeedLimits};
use swerve_core::control::VeeringCorrection;
use swerve_core::estimation::EstimatorConfig;
use swerve_core::sensors::HeadingFusionConfig;
use thiserror::Error;

use crate::controller::ControllerConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Heading fusion and veering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingConfig {
    /// Disagreement between live sensors that triggers a warning [rad]
    pub disagreement_threshold: f64,
    /// Seconds of yaw rate to lead the heading by in field-relative conversion
    pub veering_gain: f64,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            disagreement_threshold: HeadingFusionConfig::default().disagreement_threshold,
            veering_gain: VeeringCorrection::default().gain,
        }
    }
}

impl HeadingConfig {
    pub fn fusion(&self) -> HeadingFusionConfig {
        HeadingFusionConfig {
            disagreement_threshold: self.disagreement_threshold,
        }
    }

    pub fn veering(&self) -> VeeringCorrection {
        VeeringCorrection::new(self.veering_gain)
    }
}

/// Complete drive configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub limits: SpeedLimits,
    #[serde(default)]
    pub heading: HeadingConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl DriveConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: DriveConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Same configuration with the reduced demonstration limits
    pub fn show_mode(mut self) -> Self {
        self.limits = SpeedLimits::show_mode();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.limits.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "speed limits must be positive: {:?}",
                self.limits
            )));
        }

        let c = &self.controller;
        let positive = |v: f64| v > 0.0 && v.is_finite();
        if !positive(c.period) {
            return Err(ConfigError::Invalid(format!(
                "control period must be positive, got {}",
                c.period
            )));
        }
        if !positive(c.position_tolerance) || !positive(c.heading_tolerance) {
            return Err(ConfigError::Invalid("goal tolerances must be positive".into()));
        }
        if !positive(c.moving_threshold) {
            return Err(ConfigError::Invalid("moving threshold must be positive".into()));
        }

        let e = &self.estimator;
        if !positive(e.history_window) {
            return Err(ConfigError::Invalid("history window must be positive".into()));
        }
        if e.state_std.iter().chain(e.vision_std.iter()).any(|&s| !positive(s)) {
            return Err(ConfigError::Invalid(
                "estimator standard deviations must be positive".into(),
            ));
        }

        if !self.heading.veering_gain.is_finite() || !positive(self.heading.disagreement_threshold)
        {
            return Err(ConfigError::Invalid("heading settings must be finite and positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_valid() {
        let config = DriveConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.controller.position_tolerance, 0.05);
        assert_relative_eq!(config.controller.heading_tolerance, 2f64.to_radians());
        assert_relative_eq!(config.heading.veering_gain, 0.15);
        assert_eq!(config.estimator.state_std, [0.03; 3]);
    }

    #[test]
    fn test_partial_toml() {
        let config = DriveConfig::from_toml_str(
            r#"
            [geometry]
            track_width = 0.55
            wheelbase = 0.6
            max_wheel_speed = 4.0

            [limits]
            speed = 1.0
            acceleration = 2.0
            angular_speed = 1.0
            angular_acceleration = 1.0
            jerk = 8.0
            "#,
        )
        .unwrap();

        assert_relative_eq!(config.geometry.track_width, 0.55);
        assert_eq!(config.limits.jerk, Some(8.0));
        assert_relative_eq!(config.controller.period, 0.02);
        assert!(config.geometry.build_kinematics().is_ok());
    }

    #[test]
    fn test_rejects_bad_limits() {
        let result = DriveConfig::from_toml_str(
            r#"
            [limits]
            speed = -1.0
            acceleration = 2.0
            angular_speed = 1.0
            angular_acceleration = 1.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            DriveConfig::from_toml_str("[geometry\ntrack_width = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            DriveConfig::load("/nonexistent/drive.toml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_show_mode() {
        let config = DriveConfig::default().show_mode();
        assert_eq!(config.limits, SpeedLimits::show_mode());
    }
}
