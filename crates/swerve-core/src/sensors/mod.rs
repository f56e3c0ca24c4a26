//! Heading sensing
//!
//! - [`heading`]: redundant heading fusion with sticky fault detection
//! - [`mailbox`]: lock-free handoff from a sensor thread to the control tick

pub mod heading;
pub mod mailbox;

pub use heading::*;
pub use mailbox::*;
