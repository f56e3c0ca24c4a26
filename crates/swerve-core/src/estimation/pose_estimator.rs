//! Swerve pose estimator
//!
//! Fuses wheel odometry with the fused heading every control tick and
//! blends in external pose corrections (e.g. vision) when they arrive.
//!
//! Odometry: the change in module positions since the previous tick is
//! turned into a body-frame twist by the kinematics' least-squares inverse.
//! The rotation part is replaced by the heading sensor's change, and the
//! twist is integrated from the previous pose along an arc. Uncertainty
//! grows in proportion to distance travelled, so a parked vehicle does not
//! become less certain of where it is.
//!
//! Corrections: a correction names how long ago it was measured. The
//! estimator keeps a short pose history, blends the correction into the
//! pose at that moment, and replays the odometry recorded since then on top
//! of the corrected pose. Corrections older than the history window are
//! discarded as stale.

use std::collections::VecDeque;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::kalman::{diagonal_covariance, KalmanFilter};
use crate::kinematics::{ModulePositionSet, SwerveKinematics};
use crate::math::{angle_difference, normalize_angle, Pose2D};

/// External pose fix, e.g. from a vision pipeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseCorrection {
    /// Measured pose in the field frame
    pub pose: Pose2D,
    /// Age of the measurement relative to the latest odometry sample [s]
    pub timestamp_offset: f64,
    /// Blend strength in (0, 1]; the measurement noise is divided by it
    pub trust_weight: f64,
}

impl PoseCorrection {
    pub fn new(pose: Pose2D, timestamp_offset: f64, trust_weight: f64) -> Self {
        Self {
            pose,
            timestamp_offset,
            trust_weight,
        }
    }
}

/// Outcome of [`PoseEstimator::correct`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionOutcome {
    Applied,
    /// Measured before the start of the pose history
    Stale,
    /// Non-finite pose, non-positive trust or a singular update
    Rejected,
}

/// Pose estimator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Odometry standard deviation per metre travelled (x [m], y [m], heading [rad])
    pub state_std: [f64; 3],
    /// Correction standard deviation at full trust (x [m], y [m], heading [rad])
    pub vision_std: [f64; 3],
    /// Length of the pose history kept for latency compensation [s]
    pub history_window: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            state_std: [0.03, 0.03, 0.03],
            // Heading from vision is effectively ignored
            vision_std: [0.01, 0.01, 1.0e6],
            history_window: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HistoryEntry {
    time: f64,
    pose: Pose2D,
}

/// Running pose estimate from odometry plus asynchronous corrections
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    config: EstimatorConfig,
    kinematics: SwerveKinematics,
    /// x, y, heading with covariance
    filter: KalmanFilter<3, 3>,
    last_sensor_heading: f64,
    last_positions: ModulePositionSet,
    last_time: f64,
    history: VecDeque<HistoryEntry>,
    stale_corrections: u32,
    applied_corrections: u32,
}

impl PoseEstimator {
    /// Start at the identity pose
    ///
    /// `sensor_heading` and `positions` are the readings at construction;
    /// the first [`integrate`](Self::integrate) measures motion from them.
    pub fn new(
        kinematics: SwerveKinematics,
        config: EstimatorConfig,
        sensor_heading: f64,
        positions: ModulePositionSet,
    ) -> Self {
        let filter = KalmanFilter::new(&config.state_std, &config.vision_std);
        let mut estimator = Self {
            config,
            kinematics,
            filter,
            last_sensor_heading: sensor_heading,
            last_positions: positions,
            last_time: 0.0,
            history: VecDeque::new(),
            stale_corrections: 0,
            applied_corrections: 0,
        };
        estimator.reset_to(Pose2D::identity());
        estimator
    }

    /// Current estimate
    pub fn pose(&self) -> Pose2D {
        Pose2D {
            x: self.filter.x[0],
            y: self.filter.x[1],
            heading: self.filter.x[2],
        }
    }

    /// Current estimate covariance
    pub fn covariance(&self) -> &Matrix3<f64> {
        &self.filter.p
    }

    /// Advance the estimate by one odometry sample taken at `time` [s]
    pub fn integrate(&mut self, time: f64, sensor_heading: f64, positions: &ModulePositionSet) -> Pose2D {
        let previous = self.pose();

        let mut twist = self.kinematics.to_twist(&self.last_positions, positions);
        twist.dtheta = angle_difference(sensor_heading, self.last_sensor_heading);
        let next = previous.exp(&twist);

        let travel = twist.dx.hypot(twist.dy) + twist.dtheta.abs();
        let q = self.filter.q * travel;
        let delta = Vector3::new(
            next.x - previous.x,
            next.y - previous.y,
            angle_difference(next.heading, previous.heading),
        );
        self.filter.predict_with_noise(&Matrix3::identity(), &delta, &q);
        self.filter.x[2] = normalize_angle(self.filter.x[2]);

        self.last_sensor_heading = sensor_heading;
        self.last_positions = *positions;
        self.last_time = time;
        self.record(time);

        self.pose()
    }

    /// Blend an external correction into the estimate
    pub fn correct(&mut self, correction: &PoseCorrection) -> CorrectionOutcome {
        if !correction.pose.is_finite()
            || !correction.trust_weight.is_finite()
            || correction.trust_weight <= 0.0
        {
            return CorrectionOutcome::Rejected;
        }

        let age = correction.timestamp_offset.max(0.0);
        let measured_at = self.last_time - age;
        let Some(then) = self.pose_at(measured_at) else {
            self.stale_corrections += 1;
            warn!(
                age,
                window = self.config.history_window,
                "discarding stale pose correction"
            );
            return CorrectionOutcome::Stale;
        };

        let trust = correction.trust_weight.min(1.0);
        let r = diagonal_covariance(&self.config.vision_std) / trust;
        let innovation = Vector3::new(
            correction.pose.x - then.x,
            correction.pose.y - then.y,
            angle_difference(correction.pose.heading, then.heading),
        );

        let current = self.pose();
        let mut update = self.filter.clone();
        update.x = Vector3::new(then.x, then.y, then.heading);
        if !update.correct_innovation(&innovation, &Matrix3::identity(), &r) {
            return CorrectionOutcome::Rejected;
        }
        let corrected_then = Pose2D::new(update.x[0], update.x[1], update.x[2]);

        // Replay odometry recorded after the measurement on the corrected pose
        for entry in self.history.iter_mut().filter(|e| e.time > measured_at) {
            entry.pose = corrected_then.compose(&entry.pose.relative_to(&then));
        }
        let corrected_now = corrected_then.compose(&current.relative_to(&then));

        self.filter.p = update.p;
        self.filter.x = Vector3::new(corrected_now.x, corrected_now.y, corrected_now.heading);
        self.applied_corrections += 1;

        debug!(
            dx = corrected_now.x - current.x,
            dy = corrected_now.y - current.y,
            age,
            "applied pose correction"
        );
        CorrectionOutcome::Applied
    }

    /// Set the estimate directly, discarding uncertainty and history
    pub fn reset_pose(&mut self, pose: Pose2D) {
        info!(x = pose.x, y = pose.y, heading = pose.heading, "pose reset");
        self.reset_to(pose);
    }

    fn reset_to(&mut self, pose: Pose2D) {
        let base = diagonal_covariance(&self.config.state_std);
        self.filter
            .reset(Vector3::new(pose.x, pose.y, pose.heading), base);
        self.history.clear();
        self.record(self.last_time);
    }

    /// Take `sensor_heading` as the reference for the next heading change
    /// without rotating the estimate
    pub fn rebase_sensor_heading(&mut self, sensor_heading: f64) {
        self.last_sensor_heading = sensor_heading;
    }

    fn record(&mut self, time: f64) {
        let pose = self.pose();
        if let Some(last) = self.history.back_mut() {
            if last.time >= time {
                last.pose = pose;
                return;
            }
        }
        self.history.push_back(HistoryEntry { time, pose });

        let horizon = time - self.config.history_window;
        while self.history.len() > 1 && self.history.front().is_some_and(|e| e.time < horizon) {
            self.history.pop_front();
        }
    }

    /// Interpolated historical pose, or `None` before the history starts
    fn pose_at(&self, time: f64) -> Option<Pose2D> {
        let first = self.history.front()?;
        if time < first.time - 1e-9 || self.last_time - time > self.config.history_window {
            return None;
        }

        let mut before = *first;
        for entry in &self.history {
            if entry.time >= time {
                let span = entry.time - before.time;
                if span <= 0.0 {
                    return Some(entry.pose);
                }
                let alpha = (time - before.time) / span;
                return Some(interpolate(&before.pose, &entry.pose, alpha));
            }
            before = *entry;
        }
        Some(before.pose)
    }

    pub fn stale_corrections(&self) -> u32 {
        self.stale_corrections
    }

    pub fn applied_corrections(&self) -> u32 {
        self.applied_corrections
    }

    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }
}

fn interpolate(a: &Pose2D, b: &Pose2D, alpha: f64) -> Pose2D {
    Pose2D::new(
        a.x + (b.x - a.x) * alpha,
        a.y + (b.y - a.y) * alpha,
        a.heading + angle_difference(b.heading, a.heading) * alpha,
    )
}
