//! Redundant heading fusion
//!
//! Two independent heading sensors are averaged into one heading. A sensor
//! that reports itself disconnected is dropped for good: liveness is sticky
//! until [`HeadingFusion::reinit`], so a glitching sensor cannot flicker back
//! into the average. With no live sensor the last fused value is held.
//!
//! A sensor that has not produced a reading yet is not a disconnect: it is
//! left out of the average for that sample without being dropped.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::math::{angle_difference, mean_angle};

/// Number of redundant heading sensors
pub const HEADING_SENSOR_COUNT: usize = 2;

/// One heading sensor reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadingSample {
    /// Heading [rad], any cycle
    pub angle: f64,
    /// Yaw rate [rad/s], counter-clockwise positive
    pub rate: f64,
    pub source_id: u8,
    pub connected: bool,
}

impl HeadingSample {
    pub fn new(source_id: u8, angle: f64, rate: f64) -> Self {
        Self {
            angle,
            rate,
            source_id,
            connected: true,
        }
    }

    pub fn disconnected(source_id: u8) -> Self {
        Self {
            source_id,
            ..Default::default()
        }
    }
}

/// Output of one fusion step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedHeading {
    /// Heading [rad] in (-π, π]
    pub heading: f64,
    /// Yaw rate [rad/s]
    pub rate: f64,
    /// False when no sensor is live and `heading` is a held value
    pub healthy: bool,
}

/// Heading fusion tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingFusionConfig {
    /// Disagreement between live sensors that triggers a warning [rad]
    pub disagreement_threshold: f64,
}

impl Default for HeadingFusionConfig {
    fn default() -> Self {
        Self {
            disagreement_threshold: 30f64.to_radians(),
        }
    }
}

/// Fuses two heading sensors with sticky fault detection
#[derive(Debug, Clone)]
pub struct HeadingFusion {
    config: HeadingFusionConfig,
    live: [bool; HEADING_SENSOR_COUNT],
    last: FusedHeading,
    /// Sensors dropped since construction or the last reinit
    faults: u32,
    /// Samples where live sensors disagreed beyond the threshold
    disagreements: u32,
    disagreeing: bool,
}

impl HeadingFusion {
    pub fn new(config: HeadingFusionConfig) -> Self {
        Self {
            config,
            live: [true; HEADING_SENSOR_COUNT],
            last: FusedHeading {
                heading: 0.0,
                rate: 0.0,
                healthy: true,
            },
            faults: 0,
            disagreements: 0,
            disagreeing: false,
        }
    }

    /// Fuse one reading from each sensor
    pub fn sample(&mut self, first: &HeadingSample, second: &HeadingSample) -> FusedHeading {
        self.sample_available(&[Some(*first), Some(*second)])
    }

    /// Fuse the sensors that have a reading
    ///
    /// `None` marks a sensor with nothing to report yet; it is skipped for
    /// this sample and stays live.
    pub fn sample_available(
        &mut self,
        samples: &[Option<HeadingSample>; HEADING_SENSOR_COUNT],
    ) -> FusedHeading {
        for (slot, sample) in samples.iter().enumerate() {
            let Some(sample) = sample else {
                continue;
            };
            if self.live[slot] && !sample.connected {
                self.live[slot] = false;
                self.faults += 1;
                warn!(
                    source_id = sample.source_id,
                    "heading sensor disconnected, excluded until reinit"
                );
            }
        }

        let mut angles = [0.0; HEADING_SENSOR_COUNT];
        let mut rate_sum = 0.0;
        let mut count = 0;
        for (slot, sample) in samples.iter().enumerate() {
            if let (true, Some(sample)) = (self.live[slot], sample) {
                angles[count] = sample.angle;
                rate_sum += sample.rate;
                count += 1;
            }
        }

        let Some(heading) = mean_angle(&angles[..count]) else {
            if self.last.healthy && self.live_count() == 0 {
                warn!(
                    held_heading = self.last.heading,
                    "all heading sensors lost, holding last heading"
                );
            }
            self.last.healthy = false;
            return self.last;
        };

        self.check_disagreement(&angles[..count]);

        self.last = FusedHeading {
            heading,
            rate: rate_sum / count as f64,
            healthy: true,
        };
        self.last
    }

    fn check_disagreement(&mut self, angles: &[f64]) {
        let disagreeing = match angles {
            [a, b] => angle_difference(*a, *b).abs() > self.config.disagreement_threshold,
            _ => false,
        };
        if disagreeing {
            self.disagreements += 1;
            if !self.disagreeing {
                warn!(
                    first = angles[0],
                    second = angles[1],
                    threshold = self.config.disagreement_threshold,
                    "heading sensors disagree"
                );
            }
        }
        self.disagreeing = disagreeing;
    }

    /// Mark every sensor live again
    pub fn reinit(&mut self) {
        self.live = [true; HEADING_SENSOR_COUNT];
        self.disagreeing = false;
    }

    /// Last fused output
    pub fn last(&self) -> FusedHeading {
        self.last
    }

    pub fn is_live(&self, slot: usize) -> bool {
        self.live.get(slot).copied().unwrap_or(false)
    }

    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|&&l| l).count()
    }

    pub fn fault_count(&self) -> u32 {
        self.faults
    }

    pub fn disagreement_count(&self) -> u32 {
        self.disagreements
    }
}

impl Default for HeadingFusion {
    fn default() -> Self {
        Self::new(HeadingFusionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn deg(d: f64) -> f64 {
        d.to_radians()
    }

    #[test]
    fn test_average_across_wrap() {
        let mut fusion = HeadingFusion::default();
        let fused = fusion.sample(
            &HeadingSample::new(0, deg(10.0), 0.2),
            &HeadingSample::new(1, deg(350.0), 0.4),
        );

        assert!(fused.healthy);
        assert_relative_eq!(fused.heading, 0.0, epsilon = 1e-12);
        assert_relative_eq!(fused.rate, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_seam_does_not_flip() {
        let mut fusion = HeadingFusion::default();
        let fused = fusion.sample(
            &HeadingSample::new(0, deg(179.0), 0.0),
            &HeadingSample::new(1, deg(-179.0), 0.0),
        );
        assert_relative_eq!(fused.heading.abs(), deg(180.0), epsilon = 1e-12);
    }

    #[test]
    fn test_single_sensor_passes_through() {
        let mut fusion = HeadingFusion::default();
        let fused = fusion.sample(
            &HeadingSample::disconnected(0),
            &HeadingSample::new(1, deg(42.0), -0.5),
        );
        assert_relative_eq!(fused.heading, deg(42.0), epsilon = 1e-12);
        assert_relative_eq!(fused.rate, -0.5);
        assert_eq!(fusion.live_count(), 1);
    }

    #[test]
    fn test_disconnect_is_sticky() {
        let mut fusion = HeadingFusion::default();
        fusion.sample(
            &HeadingSample::disconnected(0),
            &HeadingSample::new(1, deg(20.0), 0.0),
        );

        // Sensor 0 reports connected again with a wild reading; it stays out
        let fused = fusion.sample(
            &HeadingSample::new(0, deg(-90.0), 0.0),
            &HeadingSample::new(1, deg(21.0), 0.0),
        );
        assert_relative_eq!(fused.heading, deg(21.0), epsilon = 1e-12);
        assert!(!fusion.is_live(0));
        assert_eq!(fusion.fault_count(), 1);

        fusion.reinit();
        let fused = fusion.sample(
            &HeadingSample::new(0, deg(19.0), 0.0),
            &HeadingSample::new(1, deg(21.0), 0.0),
        );
        assert_relative_eq!(fused.heading, deg(20.0), epsilon = 1e-12);
    }

    #[test]
    fn test_all_lost_holds_last_value() {
        let mut fusion = HeadingFusion::default();
        fusion.sample(
            &HeadingSample::new(0, deg(30.0), 0.1),
            &HeadingSample::new(1, deg(32.0), 0.1),
        );

        let fused = fusion.sample(&HeadingSample::disconnected(0), &HeadingSample::disconnected(1));
        assert!(!fused.healthy);
        assert_relative_eq!(fused.heading, deg(31.0), epsilon = 1e-12);
        assert_eq!(fusion.fault_count(), 2);
    }

    #[test]
    fn test_missing_reading_is_not_a_fault() {
        let mut fusion = HeadingFusion::default();
        let fused = fusion.sample_available(&[None, None]);
        assert!(!fused.healthy);
        assert_eq!(fusion.fault_count(), 0);
        assert_eq!(fusion.live_count(), 2);

        let fused = fusion.sample_available(&[None, Some(HeadingSample::new(1, deg(40.0), 0.2))]);
        assert!(fused.healthy);
        assert_relative_eq!(fused.heading, deg(40.0), epsilon = 1e-12);

        let fused = fusion.sample_available(&[
            Some(HeadingSample::new(0, deg(30.0), 0.0)),
            Some(HeadingSample::new(1, deg(40.0), 0.0)),
        ]);
        assert_relative_eq!(fused.heading, deg(35.0), epsilon = 1e-12);
        assert_eq!(fusion.fault_count(), 0);
    }

    #[test]
    fn test_disagreement_counted_but_still_averaged() {
        let mut fusion = HeadingFusion::default();
        let fused = fusion.sample(
            &HeadingSample::new(0, deg(0.0), 0.0),
            &HeadingSample::new(1, deg(60.0), 0.0),
        );
        assert_relative_eq!(fused.heading, deg(30.0), epsilon = 1e-12);
        assert_eq!(fusion.disagreement_count(), 1);
    }
}
