//! Control primitives
//!
//! - [`pid`]: PID with continuous input, used for heading
//! - [`regulator`]: per-axis LQR with Kalman observer for translation
//! - [`veering`]: heading lead for field-relative conversion

pub mod pid;
pub mod regulator;
pub mod veering;

pub use pid::*;
pub use regulator::*;
pub use veering::*;
