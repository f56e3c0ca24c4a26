//! Per-module state types
//!
//! A swerve vehicle has exactly [`MODULE_COUNT`] modules. Every array of
//! module data in this workspace uses the same fixed order:
//! front-left, front-right, rear-left, rear-right.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::math::{angle_difference, normalize_angle};

/// Number of swerve modules on the vehicle
pub const MODULE_COUNT: usize = 4;

/// Human-readable module names, in array order
pub const MODULE_NAMES: [&str; MODULE_COUNT] = ["front-left", "front-right", "rear-left", "rear-right"];

/// Steering angle [rad] and wheel speed [m/s] of one module
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    pub angle: f64,
    pub speed: f64,
}

impl ModuleState {
    pub fn new(angle: f64, speed: f64) -> Self {
        Self {
            angle: normalize_angle(angle),
            speed,
        }
    }

    /// Reverse the wheel instead of steering more than a quarter turn
    ///
    /// Returns an equivalent state whose angle is within 90° of
    /// `current_angle`.
    pub fn optimize(&self, current_angle: f64) -> ModuleState {
        let delta = angle_difference(self.angle, current_angle);
        if delta.abs() > FRAC_PI_2 {
            ModuleState::new(self.angle + std::f64::consts::PI, -self.speed)
        } else {
            *self
        }
    }
}

/// One commanded or measured state per module
pub type ModuleStateSet = [ModuleState; MODULE_COUNT];

/// Odometry sample for one module
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePosition {
    /// Steering angle [rad]
    pub angle: f64,
    /// Wheel travel since the last encoder reset [m]
    pub distance: f64,
}

impl ModulePosition {
    pub fn new(angle: f64, distance: f64) -> Self {
        Self {
            angle: normalize_angle(angle),
            distance,
        }
    }
}

/// One odometry sample per module
pub type ModulePositionSet = [ModulePosition; MODULE_COUNT];
