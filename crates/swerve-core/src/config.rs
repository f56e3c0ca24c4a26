//! Vehicle configuration
//!
//! Geometry and speed limits are chosen once at startup. Different robots
//! are different values of these structs, never different code paths.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::kinematics::{GeometryError, SwerveKinematics};

/// Module layout and actuator ceiling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Left-right module spacing [m]
    pub track_width: f64,
    /// Front-back module spacing [m]
    pub wheelbase: f64,
    /// Explicit module positions [m] (front-left, front-right, rear-left,
    /// rear-right); overrides the rectangular layout when present
    #[serde(default)]
    pub module_positions: Option<Vec<[f64; 2]>>,
    /// Wheel speed ceiling used for desaturation [m/s]
    pub max_wheel_speed: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            track_width: 0.5,
            wheelbase: 0.5,
            module_positions: None,
            max_wheel_speed: 3.0,
        }
    }
}

impl GeometryConfig {
    /// Validate and build kinematics for this layout
    pub fn build_kinematics(&self) -> Result<SwerveKinematics, GeometryError> {
        if !(self.max_wheel_speed > 0.0 && self.max_wheel_speed.is_finite()) {
            return Err(GeometryError::InvalidMaxSpeed(self.max_wheel_speed));
        }
        match &self.module_positions {
            Some(positions) => {
                let locations: Vec<Vector2<f64>> =
                    positions.iter().map(|p| Vector2::new(p[0], p[1])).collect();
                SwerveKinematics::new(&locations)
            }
            None => SwerveKinematics::rectangular(self.track_width, self.wheelbase),
        }
    }
}

/// Velocity and acceleration ceilings for planned and driven motion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedLimits {
    /// [m/s]
    pub speed: f64,
    /// [m/s²]
    pub acceleration: f64,
    /// [rad/s]
    pub angular_speed: f64,
    /// [rad/s²]
    pub angular_acceleration: f64,
    /// [m/s³]; `None` plans trapezoidal profiles
    #[serde(default)]
    pub jerk: Option<f64>,
}

impl Default for SpeedLimits {
    fn default() -> Self {
        Self::normal()
    }
}

impl SpeedLimits {
    pub fn normal() -> Self {
        Self {
            speed: 5.0,
            acceleration: 10.0,
            angular_speed: 5.0,
            angular_acceleration: 5.0,
            jerk: None,
        }
    }

    /// Reduced limits for demonstrations with inexperienced drivers
    pub fn show_mode() -> Self {
        Self {
            speed: 1.0,
            acceleration: 2.0,
            angular_speed: 1.0,
            angular_acceleration: 1.0,
            jerk: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        let positive = |v: f64| v > 0.0 && v.is_finite();
        positive(self.speed)
            && positive(self.acceleration)
            && positive(self.angular_speed)
            && positive(self.angular_acceleration)
            && self.jerk.map_or(true, positive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry_builds() {
        let kinematics = GeometryConfig::default().build_kinematics().unwrap();
        assert_eq!(kinematics.locations()[0], Vector2::new(0.25, 0.25));
    }

    #[test]
    fn test_explicit_positions_checked() {
        let config = GeometryConfig {
            module_positions: Some(vec![[0.3, 0.3], [0.3, -0.3], [-0.3, 0.3]]),
            ..Default::default()
        };
        assert!(matches!(
            config.build_kinematics(),
            Err(GeometryError::ModuleCount { expected: 4, got: 3 })
        ));
    }

    #[test]
    fn test_bad_max_speed() {
        let config = GeometryConfig {
            max_wheel_speed: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.build_kinematics(), Err(GeometryError::InvalidMaxSpeed(_))));
    }

    #[test]
    fn test_limit_presets_valid() {
        assert!(SpeedLimits::normal().is_valid());
        assert!(SpeedLimits::show_mode().is_valid());
        assert!(SpeedLimits::show_mode().speed < SpeedLimits::normal().speed);

        let bad = SpeedLimits {
            jerk: Some(-1.0),
            ..SpeedLimits::normal()
        };
        assert!(!bad.is_valid());
    }
}
