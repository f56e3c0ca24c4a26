//! Simulation configuration

use serde::{Deserialize, Serialize};

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Step length [s]
    pub dt: f64,
    /// Chassis velocity lag [s]
    pub drive_time_constant: f64,
    /// Heading sensor noise
    pub heading_noise: NoiseModel,
    /// Yaw rate sensor noise
    pub rate_noise: NoiseModel,
    /// Scheduled heading sensor failures
    #[serde(default)]
    pub dropouts: Vec<SensorDropout>,
    /// RNG seed; runs with the same seed are identical
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: 0.02,
            drive_time_constant: 0.1,
            heading_noise: NoiseModel::with_std_dev(0.001),
            rate_noise: NoiseModel::with_std_dev(0.005),
            dropouts: Vec::new(),
            seed: 42,
        }
    }
}

impl SimConfig {
    /// Noise-free configuration for deterministic tests
    pub fn ideal() -> Self {
        Self {
            heading_noise: NoiseModel::default(),
            rate_noise: NoiseModel::default(),
            ..Default::default()
        }
    }

    pub fn with_dropout(mut self, sensor: usize, at_time: f64) -> Self {
        self.dropouts.push(SensorDropout { sensor, at_time });
        self
    }
}

/// Gaussian noise with optional bias
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NoiseModel {
    pub std_dev: f64,
    pub bias: f64,
}

impl NoiseModel {
    pub fn with_std_dev(std_dev: f64) -> Self {
        Self { std_dev, bias: 0.0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.std_dev > 0.0 || self.bias != 0.0
    }
}

/// Heading sensor `sensor` reports disconnected from `at_time` on
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorDropout {
    pub sensor: usize,
    /// [s]
    pub at_time: f64,
}
