//! State estimation
//!
//! - [`kalman`]: fixed-size linear Kalman filter
//! - [`pose_estimator`]: odometry plus latency-compensated pose corrections

pub mod kalman;
pub mod pose_estimator;

pub use kalman::*;
pub use pose_estimator::*;
