//! Planar poses and twists
//!
//! `Pose2D` is a position plus heading in the fixed field frame. `Twist2D`
//! is an incremental body-frame motion; [`Pose2D::exp`] integrates one along
//! a constant-curvature arc.

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use super::angle::{angle_difference, normalize_angle};

/// Vehicle position [m] and heading [rad] in the field frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    /// Heading, always kept in (-π, π]
    pub heading: f64,
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose2D {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: normalize_angle(heading),
        }
    }

    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            heading: 0.0,
        }
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn rotation(&self) -> Rotation2<f64> {
        Rotation2::new(self.heading)
    }

    /// Apply `other`, expressed in this pose's frame, on top of this pose
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let t = self.translation() + self.rotation() * other.translation();
        Pose2D::new(t.x, t.y, self.heading + other.heading)
    }

    /// Express this pose in the frame of `origin`
    pub fn relative_to(&self, origin: &Pose2D) -> Pose2D {
        let t = origin.rotation().inverse() * (self.translation() - origin.translation());
        Pose2D::new(t.x, t.y, angle_difference(self.heading, origin.heading))
    }

    /// Integrate a body-frame twist along a constant-curvature arc
    pub fn exp(&self, twist: &Twist2D) -> Pose2D {
        let dtheta = twist.dtheta;
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
        };
        let delta = Pose2D {
            x: twist.dx * s - twist.dy * c,
            y: twist.dx * c + twist.dy * s,
            heading: normalize_angle(dtheta),
        };
        self.compose(&delta)
    }

    /// Euclidean distance between positions, ignoring heading
    pub fn distance(&self, other: &Pose2D) -> f64 {
        (self.translation() - other.translation()).norm()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }
}

/// Incremental body-frame motion: forward, left and counter-clockwise
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist2D {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist2D {
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }
}
