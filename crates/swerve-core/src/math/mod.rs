//! Planar geometry for the swerve core
//!
//! Wrap-aware angle arithmetic and 2D poses/twists.

pub mod angle;
pub mod pose;

pub use angle::*;
pub use pose::*;
