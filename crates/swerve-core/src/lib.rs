//! # Swerve Core
//!
//! Localization and control building blocks for a four-module swerve drive.
//!
//! ## Modules
//!
//! - [`math`]: Angle helpers and planar poses
//! - [`kinematics`]: Chassis velocity to module states and back
//! - [`sensors`]: Redundant heading fusion and a lock-free heading mailbox
//! - [`estimation`]: Kalman filter and latency-compensated pose estimator
//! - [`control`]: Heading PID, per-axis regulators and veering correction
//! - [`config`]: Vehicle geometry and speed limits
//! - [`simulation`]: Simulated drivetrain for closed-loop testing

pub mod config;
pub mod control;
pub mod estimation;
pub mod kinematics;
pub mod math;
pub mod sensors;
pub mod simulation;

pub use config::{GeometryConfig, SpeedLimits};

/// Nominal control period [s]
pub const CONTROL_PERIOD: f64 = 0.02;
