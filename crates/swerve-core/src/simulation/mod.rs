//! Simulated swerve drivetrain
//!
//! Stands in for the hardware in closed-loop tests and demos: a chassis
//! with first-order velocity lag, module odometry and two noisy heading
//! sensors that can be made to drop out.

pub mod config;
pub mod sensors;
pub mod simulator;

pub use config::*;
pub use sensors::*;
pub use simulator::*;
