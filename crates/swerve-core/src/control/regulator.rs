//! Per-axis LQR regulator with a Kalman observer
//!
//! Each translational axis is modelled as a velocity-commanded mechanism
//! whose speed follows the command with a first-order lag:
//!
//! ```text
//! ṗ = v
//! v̇ = (u - v) / τ
//! ```
//!
//! The loop runs once per control period: correct the observer with the
//! measured position, compute `u = u_ff + K·(r - x̂)`, clamp it, then
//! predict the observer forward with the applied command. The gain `K` is
//! the steady-state discrete LQR gain, weighted with Bryson's rule.

use nalgebra::{Matrix1x2, Matrix2, RowVector2, Vector1, Vector2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::estimation::KalmanFilter;

const RICCATI_MAX_ITERATIONS: usize = 10_000;
const RICCATI_TOLERANCE: f64 = 1e-10;

/// Regulator construction errors
#[derive(Debug, Error, PartialEq)]
pub enum RegulatorError {
    #[error("Time constant and period must be positive (tau = {tau}, dt = {dt})")]
    InvalidTiming { tau: f64, dt: f64 },
    #[error("Tolerances and command limit must be positive")]
    InvalidWeights,
    #[error("Riccati iteration did not converge")]
    GainDidNotConverge,
}

/// Position and its derivatives along one axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

impl MotionState {
    pub fn new(position: f64, velocity: f64, acceleration: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
        }
    }

    pub fn at_rest(position: f64) -> Self {
        Self::new(position, 0.0, 0.0)
    }
}

/// Tuning for one axis regulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisRegulatorConfig {
    /// Velocity response time constant τ [s]
    pub time_constant: f64,
    /// Acceptable position excursion for the LQR cost [m]
    pub position_tolerance: f64,
    /// Acceptable velocity excursion for the LQR cost [m/s]
    pub velocity_tolerance: f64,
    /// Largest velocity command [m/s]
    pub max_command: f64,
    /// Observer model noise (position [m], velocity [m/s])
    pub model_std: [f64; 2],
    /// Observer position measurement noise [m]
    pub measurement_std: f64,
}

impl Default for AxisRegulatorConfig {
    fn default() -> Self {
        Self {
            time_constant: 0.1,
            position_tolerance: 0.05,
            velocity_tolerance: 0.5,
            max_command: 3.0,
            model_std: [0.02, 0.2],
            measurement_std: 0.01,
        }
    }
}

/// Discretized first-order-lag axis plant
#[derive(Debug, Clone, Copy)]
pub struct AxisPlant {
    pub tau: f64,
    pub a: Matrix2<f64>,
    pub b: Vector2<f64>,
}

impl AxisPlant {
    /// Zero-order-hold discretization over `dt`
    pub fn discretize(tau: f64, dt: f64) -> Result<Self, RegulatorError> {
        if !(tau > 0.0 && dt > 0.0) {
            return Err(RegulatorError::InvalidTiming { tau, dt });
        }
        let decay = (-dt / tau).exp();
        let a = Matrix2::new(1.0, tau * (1.0 - decay), 0.0, decay);
        let b = Vector2::new(dt - tau * (1.0 - decay), 1.0 - decay);
        Ok(Self { tau, a, b })
    }
}

/// Steady-state discrete LQR gain for the given plant and weights
pub fn solve_gain(
    a: &Matrix2<f64>,
    b: &Vector2<f64>,
    q: &Matrix2<f64>,
    r: f64,
) -> Result<RowVector2<f64>, RegulatorError> {
    let mut p = *q;
    for _ in 0..RICCATI_MAX_ITERATIONS {
        let bt_p = b.transpose() * p;
        let denom = r + (bt_p * b)[0];
        let k = (bt_p * a) / denom;
        let next = q + a.transpose() * p * a - a.transpose() * p * b * k;
        let delta = (next - p).abs().max();
        p = next;
        if delta < RICCATI_TOLERANCE {
            let bt_p = b.transpose() * p;
            return Ok((bt_p * a) / (r + (bt_p * b)[0]));
        }
    }
    Err(RegulatorError::GainDidNotConverge)
}

/// Feedforward plus LQR feedback on one axis
#[derive(Debug, Clone)]
pub struct AxisRegulator {
    plant: AxisPlant,
    gain: RowVector2<f64>,
    observer: KalmanFilter<2, 1>,
    max_command: f64,
    last_command: f64,
}

impl AxisRegulator {
    pub fn new(config: &AxisRegulatorConfig, dt: f64) -> Result<Self, RegulatorError> {
        let plant = AxisPlant::discretize(config.time_constant, dt)?;
        if !(config.position_tolerance > 0.0
            && config.velocity_tolerance > 0.0
            && config.max_command > 0.0)
        {
            return Err(RegulatorError::InvalidWeights);
        }

        let q = Matrix2::new(
            1.0 / config.position_tolerance.powi(2),
            0.0,
            0.0,
            1.0 / config.velocity_tolerance.powi(2),
        );
        let r = 1.0 / config.max_command.powi(2);
        let gain = solve_gain(&plant.a, &plant.b, &q, r)?;

        let observer = KalmanFilter::new(&config.model_std, &[config.measurement_std]);

        Ok(Self {
            plant,
            gain,
            observer,
            max_command: config.max_command,
            last_command: 0.0,
        })
    }

    /// Seed the observer with the current position and velocity
    pub fn reset(&mut self, position: f64, velocity: f64) {
        let p = self.observer.q;
        self.observer.reset(Vector2::new(position, velocity), p);
        self.last_command = velocity;
    }

    /// One control period: returns the velocity command for this axis
    pub fn update(&mut self, reference: &MotionState, measured_position: f64) -> f64 {
        self.observer
            .correct(&Vector1::new(measured_position), &Matrix1x2::new(1.0, 0.0));

        let feedforward = reference.velocity + self.plant.tau * reference.acceleration;
        let error = Vector2::new(reference.position, reference.velocity) - self.observer.x;
        let feedback = (self.gain * error)[0];

        let command = (feedforward + feedback).clamp(-self.max_command, self.max_command);
        self.observer
            .predict(&self.plant.a, &(self.plant.b * command));
        self.last_command = command;
        command
    }

    /// Observer estimate (position, velocity)
    pub fn estimate(&self) -> (f64, f64) {
        (self.observer.x[0], self.observer.x[1])
    }

    pub fn gain(&self) -> RowVector2<f64> {
        self.gain
    }

    pub fn last_command(&self) -> f64 {
        self.last_command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 0.02;

    /// Exact simulation of the modelled plant
    fn step(plant: &AxisPlant, x: Vector2<f64>, u: f64) -> Vector2<f64> {
        plant.a * x + plant.b * u
    }

    #[test]
    fn test_discretization_steady_state() {
        let plant = AxisPlant::discretize(0.1, DT).unwrap();
        // Holding u = v keeps velocity constant
        let x = step(&plant, Vector2::new(0.0, 1.5), 1.5);
        assert_relative_eq!(x[1], 1.5, epsilon = 1e-12);
        assert_relative_eq!(x[0], 1.5 * DT, epsilon = 1e-12);
    }

    #[test]
    fn test_gain_is_stabilizing() {
        let config = AxisRegulatorConfig::default();
        let regulator = AxisRegulator::new(&config, DT).unwrap();
        let plant = AxisPlant::discretize(config.time_constant, DT).unwrap();

        let k = regulator.gain();
        assert!(k[0] > 0.0);

        let closed = plant.a - plant.b * k;
        let eigen = closed.complex_eigenvalues();
        for lambda in eigen.iter() {
            assert!(lambda.norm() < 1.0);
        }
    }

    #[test]
    fn test_regulates_to_fixed_reference() {
        let config = AxisRegulatorConfig::default();
        let mut regulator = AxisRegulator::new(&config, DT).unwrap();
        let plant = AxisPlant::discretize(config.time_constant, DT).unwrap();

        regulator.reset(0.0, 0.0);
        let mut x = Vector2::zeros();
        let reference = MotionState::at_rest(1.0);
        for _ in 0..250 {
            let u = regulator.update(&reference, x[0]);
            assert!(u.abs() <= config.max_command + 1e-12);
            x = step(&plant, x, u);
        }
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-2);
    }

    #[test]
    fn test_feedforward_only_when_tracking() {
        let config = AxisRegulatorConfig::default();
        let mut regulator = AxisRegulator::new(&config, DT).unwrap();

        regulator.reset(2.0, 1.0);
        let u = regulator.update(&MotionState::new(2.0, 1.0, 0.0), 2.0);
        assert_relative_eq!(u, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_configuration() {
        let config = AxisRegulatorConfig {
            time_constant: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            AxisRegulator::new(&config, DT),
            Err(RegulatorError::InvalidTiming { .. })
        ));

        let config = AxisRegulatorConfig {
            max_command: -1.0,
            ..Default::default()
        };
        assert_eq!(AxisRegulator::new(&config, DT).unwrap_err(), RegulatorError::InvalidWeights);
    }
}
