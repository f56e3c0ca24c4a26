//! Goal-to-profile planning
//!
//! Each translational axis gets its own minimum-time [`AxisProfile`]; the
//! two are not synchronized, so a diagonal move may finish one axis
//! before the other. Heading is profiled separately with the angular
//! limits and always turns the shorter way.

use serde::{Deserialize, Serialize};
use swerve_core::config::SpeedLimits;
use swerve_core::control::MotionState;
use swerve_core::kinematics::ChassisVelocity;
use swerve_core::math::{unwrap_toward, Pose2D};
use thiserror::Error;
use tracing::debug;

use crate::profile::{AxisProfile, ProfileConstraints, ProfileError};

/// Planning errors
#[derive(Debug, Error, PartialEq)]
pub enum PlannerError {
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

/// Planning request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub target_pose: Pose2D,
    /// Per-axis velocity limit [m/s]
    pub max_velocity: f64,
    /// Per-axis acceleration limit [m/s²]
    pub max_acceleration: f64,
    /// Per-axis jerk limit [m/s³]; `None` for trapezoidal profiles
    pub max_jerk: Option<f64>,
}

impl Goal {
    pub fn new(target_pose: Pose2D, max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            target_pose,
            max_velocity,
            max_acceleration,
            max_jerk: None,
        }
    }

    /// Goal using the translational limits of `limits`
    pub fn with_limits(target_pose: Pose2D, limits: &SpeedLimits) -> Self {
        Self {
            target_pose,
            max_velocity: limits.speed,
            max_acceleration: limits.acceleration,
            max_jerk: limits.jerk,
        }
    }

    pub fn with_jerk(mut self, max_jerk: f64) -> Self {
        self.max_jerk = Some(max_jerk);
        self
    }

    fn constraints(&self) -> ProfileConstraints {
        ProfileConstraints::new(self.max_velocity, self.max_acceleration, self.max_jerk)
    }
}

/// Where the vehicle is when planning starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanStart {
    pub pose: Pose2D,
    /// Field-frame velocity
    pub velocity: ChassisVelocity,
}

impl PlanStart {
    pub fn at_rest(pose: Pose2D) -> Self {
        Self {
            pose,
            velocity: ChassisVelocity::zero(),
        }
    }
}

/// Reference state for one instant of a planned motion
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionReference {
    pub x: MotionState,
    pub y: MotionState,
    /// Heading reference, unwrapped relative to the start heading [rad]
    pub heading: MotionState,
}

/// Profiles for x, y and heading from one plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMotion {
    pub x: AxisProfile,
    pub y: AxisProfile,
    pub heading: AxisProfile,
    pub target: Pose2D,
}

impl PlannedMotion {
    /// Time until every profile has finished [s]
    pub fn duration(&self) -> f64 {
        self.x
            .duration()
            .max(self.y.duration())
            .max(self.heading.duration())
    }

    pub fn sample(&self, t: f64) -> MotionReference {
        MotionReference {
            x: self.x.sample(t),
            y: self.y.sample(t),
            heading: self.heading.sample(t),
        }
    }
}

/// Builds [`PlannedMotion`]s from goals
#[derive(Debug, Clone)]
pub struct TrajectoryPlanner {
    heading_constraints: ProfileConstraints,
}

impl TrajectoryPlanner {
    /// Planner that profiles heading with the angular limits of `limits`
    pub fn new(limits: &SpeedLimits) -> Self {
        Self {
            heading_constraints: ProfileConstraints::new(
                limits.angular_speed,
                limits.angular_acceleration,
                None,
            ),
        }
    }

    /// Plan from `start` to `goal`
    ///
    /// The profiles start at the current state, so a replan never jumps
    /// back to an earlier start point.
    pub fn plan(&self, start: &PlanStart, goal: &Goal) -> Result<PlannedMotion, PlannerError> {
        if !goal.target_pose.is_finite() {
            return Err(PlannerError::InvalidGoal("target pose is not finite".into()));
        }
        if !start.pose.is_finite() {
            return Err(PlannerError::InvalidGoal("start pose is not finite".into()));
        }
        let constraints = goal.constraints();
        constraints.validate()?;

        let target = goal.target_pose;
        let x = AxisProfile::generate(
            MotionState::new(start.pose.x, start.velocity.vx, 0.0),
            target.x,
            &constraints,
        )?;
        let y = AxisProfile::generate(
            MotionState::new(start.pose.y, start.velocity.vy, 0.0),
            target.y,
            &constraints,
        )?;
        let heading = AxisProfile::generate(
            MotionState::new(start.pose.heading, start.velocity.omega, 0.0),
            unwrap_toward(target.heading, start.pose.heading),
            &self.heading_constraints,
        )?;

        let motion = PlannedMotion {
            x,
            y,
            heading,
            target,
        };
        debug!(
            x = target.x,
            y = target.y,
            heading = target.heading,
            duration = motion.duration(),
            "planned motion"
        );
        Ok(motion)
    }

    pub fn heading_constraints(&self) -> &ProfileConstraints {
        &self.heading_constraints
    }
}

impl Default for TrajectoryPlanner {
    fn default() -> Self {
        Self::new(&SpeedLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_axes_planned_independently() {
        let planner = TrajectoryPlanner::default();
        let goal = Goal::new(Pose2D::new(4.0, 1.0, 0.0), 2.0, 2.0);
        let motion = planner
            .plan(&PlanStart::at_rest(Pose2D::identity()), &goal)
            .unwrap();

        assert!(motion.x.duration() > motion.y.duration());
        assert_relative_eq!(motion.duration(), motion.x.duration());
        let end = motion.sample(motion.duration());
        assert_relative_eq!(end.x.position, 4.0);
        assert_relative_eq!(end.y.position, 1.0);
    }

    #[test]
    fn test_heading_takes_short_way() {
        let planner = TrajectoryPlanner::default();
        let start = PlanStart::at_rest(Pose2D::new(0.0, 0.0, 170f64.to_radians()));
        let goal = Goal::new(Pose2D::new(0.0, 0.0, -170f64.to_radians()), 1.0, 1.0);
        let motion = planner.plan(&start, &goal).unwrap();

        // 20° counter-clockwise across the seam, not 340° clockwise
        assert_relative_eq!(motion.heading.goal(), 190f64.to_radians(), epsilon = 1e-9);
        let mid = motion.sample(motion.heading.duration() / 2.0);
        assert!(mid.heading.velocity > 0.0);
        assert!(mid.heading.position > PI - 0.2);
    }

    #[test]
    fn test_replan_starts_from_current_state() {
        let planner = TrajectoryPlanner::default();
        let start = PlanStart {
            pose: Pose2D::new(2.0, 0.0, 0.0),
            velocity: ChassisVelocity::new(1.0, 0.0, 0.0),
        };
        let motion = planner
            .plan(&start, &Goal::new(Pose2D::new(5.0, 0.0, 0.0), 2.0, 2.0))
            .unwrap();
        let first = motion.sample(0.0);
        assert_relative_eq!(first.x.position, 2.0);
        assert_relative_eq!(first.x.velocity, 1.0);
    }

    #[test]
    fn test_goal_uses_speed_limits() {
        let goal = Goal::with_limits(Pose2D::identity(), &SpeedLimits::show_mode());
        assert_eq!(goal.max_velocity, 1.0);
        assert_eq!(goal.max_acceleration, 2.0);
        assert_eq!(goal.with_jerk(3.0).max_jerk, Some(3.0));
    }

    #[test]
    fn test_invalid_goal_rejected() {
        let planner = TrajectoryPlanner::default();
        let start = PlanStart::at_rest(Pose2D::identity());

        let nan = Goal::new(Pose2D::new(f64::NAN, 0.0, 0.0), 1.0, 1.0);
        assert!(matches!(planner.plan(&start, &nan), Err(PlannerError::InvalidGoal(_))));

        let slow = Goal::new(Pose2D::new(1.0, 0.0, 0.0), 0.0, 1.0);
        assert!(matches!(
            planner.plan(&start, &slow),
            Err(PlannerError::Profile(ProfileError::InvalidConstraints(_)))
        ));
    }
}
