//! Swerve drive kinematics
//!
//! - [`module`]: module state, odometry sample and the fixed module order
//! - [`chassis`]: chassis velocity and frame conversion
//! - [`swerve`]: forward/inverse kinematics and speed desaturation

pub mod chassis;
pub mod module;
pub mod swerve;

pub use chassis::*;
pub use module::*;
pub use swerve::*;
