//! Simulated heading sensors

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use super::config::NoiseModel;
use crate::math::normalize_angle;
use crate::sensors::HeadingSample;

/// Noisy gyro-backed heading sensor
#[derive(Debug, Clone)]
pub struct SimulatedHeadingSensor {
    source_id: u8,
    heading_noise: NoiseModel,
    rate_noise: NoiseModel,
    /// Time after which the sensor reports disconnected [s]
    dropout_at: Option<f64>,
    rng: StdRng,
}

impl SimulatedHeadingSensor {
    pub fn new(source_id: u8, heading_noise: NoiseModel, rate_noise: NoiseModel, seed: u64) -> Self {
        Self {
            source_id,
            heading_noise,
            rate_noise,
            dropout_at: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn source_id(&self) -> u8 {
        self.source_id
    }

    /// Schedule a permanent disconnect
    pub fn drop_out_at(&mut self, time: f64) {
        self.dropout_at = Some(time);
    }

    pub fn is_connected(&self, time: f64) -> bool {
        self.dropout_at.map_or(true, |t| time < t)
    }

    /// Reading for the true heading and yaw rate at `time`
    pub fn measure(&mut self, time: f64, heading: f64, rate: f64) -> HeadingSample {
        if !self.is_connected(time) {
            return HeadingSample::disconnected(self.source_id);
        }
        let angle = normalize_angle(heading + sample(&mut self.rng, &self.heading_noise));
        let rate = rate + sample(&mut self.rng, &self.rate_noise);
        HeadingSample::new(self.source_id, angle, rate)
    }
}

fn sample(rng: &mut StdRng, noise: &NoiseModel) -> f64 {
    if !noise.is_enabled() {
        return 0.0;
    }
    if noise.std_dev <= 0.0 {
        return noise.bias;
    }
    match Normal::new(noise.bias, noise.std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => noise.bias,
    }
}
