//! Veering correction
//!
//! A swerve vehicle that translates while rotating drifts sideways, because
//! the field-to-body conversion uses the heading at the start of the tick
//! while the body keeps turning through it. Converting with the heading
//! advanced by `gain × yaw rate` cancels most of that drift.

use serde::{Deserialize, Serialize};

use crate::math::normalize_angle;

/// Heading lead applied to field-relative conversions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VeeringCorrection {
    /// Lead time [s]
    pub gain: f64,
}

impl Default for VeeringCorrection {
    fn default() -> Self {
        Self { gain: 0.15 }
    }
}

impl VeeringCorrection {
    pub fn new(gain: f64) -> Self {
        Self { gain }
    }

    /// Heading to use when converting a field-relative command
    pub fn correct(&self, heading: f64, yaw_rate: f64) -> f64 {
        normalize_angle(heading + self.gain * yaw_rate)
    }
}
