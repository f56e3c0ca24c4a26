//! Chassis velocity
//!
//! The frame of `vx`/`vy` is not stored in the type. Each function that
//! takes or returns a `ChassisVelocity` states which frame it uses.

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

/// Planar velocity: translation [m/s] and rotation [rad/s]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisVelocity {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl ChassisVelocity {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Convert a field-relative velocity to the body frame of a vehicle at `heading`
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, heading: f64) -> Self {
        let body = Rotation2::new(-heading) * Vector2::new(vx, vy);
        Self::new(body.x, body.y, omega)
    }

    /// Convert this body-frame velocity to the field frame
    pub fn to_field_relative(&self, heading: f64) -> Self {
        let field = Rotation2::new(heading) * Vector2::new(self.vx, self.vy);
        Self::new(field.x, field.y, self.omega)
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.vx, self.vy)
    }

    /// True when any component magnitude reaches `threshold`
    pub fn is_moving(&self, threshold: f64) -> bool {
        self.vx.abs() >= threshold || self.vy.abs() >= threshold || self.omega.abs() >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_field_relative_round_trip() {
        let body = ChassisVelocity::from_field_relative(1.0, 0.0, 0.5, FRAC_PI_2);
        // Facing +y, a +x field velocity is to the vehicle's right
        assert_relative_eq!(body.vx, 0.0, epsilon = 1e-12);
        assert_relative_eq!(body.vy, -1.0, epsilon = 1e-12);

        let field = body.to_field_relative(FRAC_PI_2);
        assert_relative_eq!(field.vx, 1.0, epsilon = 1e-12);
        assert_relative_eq!(field.vy, 0.0, epsilon = 1e-12);
        assert_relative_eq!(field.omega, 0.5);
    }

    #[test]
    fn test_moving_uses_magnitude() {
        assert!(!ChassisVelocity::new(0.05, -0.05, 0.0).is_moving(0.1));
        assert!(ChassisVelocity::new(0.0, -0.2, 0.0).is_moving(0.1));
        assert!(ChassisVelocity::new(0.0, 0.0, -0.1).is_moving(0.1));
    }
}
