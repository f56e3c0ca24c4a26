//! Swerve Motion Planner
//!
//! Drives a swerve vehicle to goal poses on top of the localization and
//! control primitives in `swerve-core`.
//!
//! # Architecture
//!
//! One periodic tick (20 ms nominal) runs, in order:
//!
//! ```text
//! heading sensors ─▶ HeadingFusion ─▶ PoseEstimator ◀─ module odometry
//!                                         ▲    │       ◀─ queued vision fixes
//!                                         │    ▼
//!            TrajectoryPlanner ─▶ HolonomicController ─▶ SwerveKinematics ─▶ modules
//! ```
//!
//! # Components
//!
//! - [`profile`]: Trapezoidal and jerk-limited single-axis profiles
//! - [`planner`]: Goals to per-axis and heading profiles
//! - [`controller`]: Feedforward plus feedback trajectory following
//! - [`hardware`]: Module driver and heading sensor collaborators
//! - [`corrections`]: Non-blocking pose correction queue
//! - [`drive`]: The control loop tying everything together
//! - [`config`]: TOML-loadable drive configuration

pub mod config;
pub mod controller;
pub mod corrections;
pub mod drive;
pub mod hardware;
pub mod planner;
pub mod profile;

// Re-exports
pub use config::DriveConfig;
pub use controller::{ControllerStatus, HolonomicController};
pub use corrections::{correction_channel, CorrectionQueue, CorrectionSender};
pub use drive::{Diagnostics, DriveLoop};
pub use planner::{Goal, TrajectoryPlanner};
pub use profile::AxisProfile;
