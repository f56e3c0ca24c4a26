//! PID controller
//!
//! Scalar PID with integrator clamping and optional continuous input, used
//! for heading where the measurement wraps.

use serde::{Deserialize, Serialize};

/// PID gains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 3.0,
            ki: 0.0,
            kd: 0.0,
        }
    }
}

/// PID with anti-windup
#[derive(Debug, Clone)]
pub struct PidController {
    pub gains: PidGains,
    /// Inputs equal modulo this span (e.g. 2π for radians)
    continuous: Option<(f64, f64)>,
    /// Bounds on the integral term's contribution to the output
    integrator_range: (f64, f64),
    integral_error: f64,
    prev_error: Option<f64>,
    last_error: f64,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            continuous: None,
            integrator_range: (-1.0, 1.0),
            integral_error: 0.0,
            prev_error: None,
            last_error: 0.0,
        }
    }

    /// Treat `min` and `max` as the same input, taking the shorter way around
    pub fn enable_continuous_input(&mut self, min: f64, max: f64) {
        self.continuous = Some((min, max));
    }

    pub fn set_integrator_range(&mut self, min: f64, max: f64) {
        self.integrator_range = (min, max);
    }

    /// Controller output for one step of length `dt`
    pub fn calculate(&mut self, measurement: f64, setpoint: f64, dt: f64) -> f64 {
        let error = self.error(measurement, setpoint);

        if self.gains.ki != 0.0 {
            self.integral_error += error * dt;
            let (lo, hi) = self.integrator_range;
            let bound_lo = lo / self.gains.ki.abs();
            let bound_hi = hi / self.gains.ki.abs();
            self.integral_error = self.integral_error.clamp(bound_lo.min(bound_hi), bound_lo.max(bound_hi));
        }

        let derivative = match self.prev_error {
            Some(prev) if dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };
        self.prev_error = Some(error);
        self.last_error = error;

        self.gains.kp * error + self.gains.ki * self.integral_error + self.gains.kd * derivative
    }

    fn error(&self, measurement: f64, setpoint: f64) -> f64 {
        let raw = setpoint - measurement;
        match self.continuous {
            Some((min, max)) => {
                let span = max - min;
                let half = span / 2.0;
                (raw + half).rem_euclid(span) - half
            }
            None => raw,
        }
    }

    /// Error from the last call to [`calculate`](Self::calculate)
    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    /// Clear integral and derivative memory
    pub fn reset(&mut self) {
        self.integral_error = 0.0;
        self.prev_error = None;
        self.last_error = 0.0;
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self::new(PidGains::default())
    }
}
