//! Holonomic trajectory controller
//!
//! Follows a [`PlannedMotion`] one control period at a time. Translation
//! uses one [`AxisRegulator`] per field axis (profile feedforward plus LQR
//! feedback on an observer estimate). Heading uses the heading profile's
//! velocity plus a PID with continuous input. The field-frame command is
//! rotated into the body frame with a veering-corrected heading.
//!
//! # State machine
//!
//! ```text
//! Idle ──set_goal──▶ Running ──within tolerance──▶ AtGoal
//!   ▲                   ▲                             │
//!   └──────cancel───────┴─────────set_goal────────────┘
//! ```
//!
//! `AtGoal` latches; control continues so the vehicle holds the target.

use serde::{Deserialize, Serialize};
use swerve_core::control::{
    AxisRegulator, AxisRegulatorConfig, PidController, PidGains, RegulatorError, VeeringCorrection,
};
use swerve_core::kinematics::ChassisVelocity;
use swerve_core::math::{angle_difference, Pose2D};
use swerve_core::CONTROL_PERIOD;
use tracing::{debug, info};

use crate::planner::{MotionReference, PlannedMotion};

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerStatus {
    /// No goal
    Idle,
    /// Following a planned motion
    Running,
    /// Position and heading within tolerance
    AtGoal,
}

/// Controller tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Translation regulator tuning, shared by x and y. Its `max_command`
    /// also caps the speed of goals planned from the configured limits.
    pub axis: AxisRegulatorConfig,
    /// Heading feedback gains
    pub heading_gains: PidGains,
    /// Distance to the target that counts as arrived [m]
    pub position_tolerance: f64,
    /// Heading error that counts as arrived [rad]
    pub heading_tolerance: f64,
    /// Control period [s]
    pub period: f64,
    /// Any achieved velocity component at or above this counts as moving
    pub moving_threshold: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            axis: AxisRegulatorConfig::default(),
            heading_gains: PidGains::default(),
            position_tolerance: 0.05,
            heading_tolerance: 2f64.to_radians(),
            period: CONTROL_PERIOD,
            moving_threshold: 0.1,
        }
    }
}

/// Goal errors as of the last update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GoalError {
    distance: f64,
    heading: f64,
}

/// Per-tick controller for a holonomic chassis
#[derive(Debug, Clone)]
pub struct HolonomicController {
    config: ControllerConfig,
    x: AxisRegulator,
    y: AxisRegulator,
    heading: PidController,
    veering: VeeringCorrection,
    motion: Option<PlannedMotion>,
    status: ControllerStatus,
    enabled: bool,
    /// Regulators must be reseeded before feedback resumes
    stale_feedback: bool,
    clock_start: f64,
    goal_error: GoalError,
    reference: MotionReference,
    field_command: ChassisVelocity,
}

impl HolonomicController {
    pub fn new(config: ControllerConfig, veering: VeeringCorrection) -> Result<Self, RegulatorError> {
        let x = AxisRegulator::new(&config.axis, config.period)?;
        let y = AxisRegulator::new(&config.axis, config.period)?;
        let mut heading = PidController::new(config.heading_gains);
        heading.enable_continuous_input(-std::f64::consts::PI, std::f64::consts::PI);

        Ok(Self {
            config,
            x,
            y,
            heading,
            veering,
            motion: None,
            status: ControllerStatus::Idle,
            enabled: true,
            stale_feedback: true,
            clock_start: 0.0,
            goal_error: GoalError::default(),
            reference: MotionReference::default(),
            field_command: ChassisVelocity::zero(),
        })
    }

    /// Follow `motion` from `now`, replacing any current goal
    ///
    /// `pose` and `field_velocity` seed the regulators so feedback starts
    /// from the current state.
    pub fn set_goal(
        &mut self,
        motion: PlannedMotion,
        now: f64,
        pose: &Pose2D,
        field_velocity: &ChassisVelocity,
    ) {
        info!(
            x = motion.target.x,
            y = motion.target.y,
            heading = motion.target.heading,
            previous = ?self.status,
            "new goal"
        );
        self.goal_error = goal_error(&motion.target, pose);
        self.motion = Some(motion);
        self.reseed(pose, field_velocity);
        self.status = ControllerStatus::Running;
        self.start(now);
    }

    /// Restart the profile clock at `now`
    pub fn start(&mut self, now: f64) {
        self.clock_start = now;
        if self.motion.is_some() && self.status == ControllerStatus::Idle {
            self.status = ControllerStatus::Running;
        }
    }

    /// Drop the goal and return to idle
    pub fn cancel(&mut self) {
        if self.status != ControllerStatus::Idle {
            info!(previous = ?self.status, "goal cancelled");
        }
        self.motion = None;
        self.status = ControllerStatus::Idle;
        self.field_command = ChassisVelocity::zero();
    }

    /// Enable or disable feedback
    ///
    /// While disabled only the profile feedforward is produced and no
    /// feedback state is updated; the regulators restart from the measured
    /// state when re-enabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            info!(enabled, "controller feedback toggled");
        }
        if !enabled {
            self.stale_feedback = true;
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Body-frame velocity command for this tick
    ///
    /// `field_velocity` is the achieved velocity in the field frame and
    /// `yaw_rate` the fused heading rate. Returns zero while idle.
    pub fn calculate(
        &mut self,
        now: f64,
        pose: &Pose2D,
        field_velocity: &ChassisVelocity,
        yaw_rate: f64,
    ) -> ChassisVelocity {
        let Some(motion) = &self.motion else {
            self.field_command = ChassisVelocity::zero();
            return ChassisVelocity::zero();
        };

        let reference = motion.sample(self.elapsed(now));
        self.goal_error = goal_error(&motion.target, pose);
        self.reference = reference;

        let field = if self.enabled {
            if self.stale_feedback {
                self.reseed(pose, field_velocity);
            }
            let vx = self.x.update(&reference.x, pose.x);
            let vy = self.y.update(&reference.y, pose.y);
            let omega = reference.heading.velocity
                + self
                    .heading
                    .calculate(pose.heading, reference.heading.position, self.config.period);
            ChassisVelocity::new(vx, vy, omega)
        } else {
            ChassisVelocity::new(
                reference.x.velocity,
                reference.y.velocity,
                reference.heading.velocity,
            )
        };
        self.field_command = field;

        if self.status == ControllerStatus::Running && self.at_reference() {
            info!(elapsed = self.elapsed(now), "goal reached");
            self.status = ControllerStatus::AtGoal;
        }

        let heading = self.veering.correct(pose.heading, yaw_rate);
        debug!(vx = field.vx, vy = field.vy, omega = field.omega, "controller output");
        ChassisVelocity::from_field_relative(field.vx, field.vy, field.omega, heading)
    }

    /// True iff a goal is set and position and heading errors are within tolerance
    pub fn at_reference(&self) -> bool {
        self.status != ControllerStatus::Idle
            && self.goal_error.distance < self.config.position_tolerance
            && self.goal_error.heading.abs() < self.config.heading_tolerance
    }

    fn reseed(&mut self, pose: &Pose2D, field_velocity: &ChassisVelocity) {
        self.x.reset(pose.x, field_velocity.vx);
        self.y.reset(pose.y, field_velocity.vy);
        self.heading.reset();
        self.stale_feedback = false;
    }

    /// Seconds since the profile clock started
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.clock_start).max(0.0)
    }

    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    pub fn motion(&self) -> Option<&PlannedMotion> {
        self.motion.as_ref()
    }

    /// Reference sampled on the last update
    pub fn reference(&self) -> &MotionReference {
        &self.reference
    }

    /// Field-frame command from the last update
    pub fn field_command(&self) -> ChassisVelocity {
        self.field_command
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}

fn goal_error(target: &Pose2D, pose: &Pose2D) -> GoalError {
    GoalError {
        distance: target.distance(pose),
        heading: angle_difference(target.heading, pose.heading),
    }
}
