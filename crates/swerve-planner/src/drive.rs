//! Control loop
//!
//! [`DriveLoop`] owns every stateful piece of the localization and control
//! core and runs one tick in dependency order:
//!
//! 1. read and fuse heading sensors
//! 2. integrate odometry, then apply queued pose corrections
//! 3. measure the achieved chassis velocity
//! 4. if a goal is active, compute and write the module command
//!
//! Nothing in a tick blocks. Sensor faults, saturation and stale
//! corrections are counted in [`Diagnostics`], never returned as errors.

use swerve_core::config::SpeedLimits;
use swerve_core::control::{RegulatorError, VeeringCorrection};
use swerve_core::estimation::{CorrectionOutcome, PoseCorrection, PoseEstimator};
use swerve_core::kinematics::{
    desaturate, ChassisVelocity, GeometryError, ModuleStateSet, SwerveKinematics,
};
use swerve_core::math::Pose2D;
use swerve_core::sensors::{FusedHeading, HeadingFusion};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, DriveConfig};
use crate::controller::{ControllerStatus, HolonomicController};
use crate::corrections::CorrectionQueue;
use crate::hardware::{HeadingSource, ModuleDriver};
use crate::planner::{Goal, PlanStart, PlannerError, TrajectoryPlanner};

/// Teleop inputs below this are shaped quadratically
const TELEOP_DEADBAND: f64 = 0.01;

/// Drive loop construction errors
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Regulator error: {0}")]
    Regulator(#[from] RegulatorError),
}

/// Degraded-operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub ticks: u64,
    /// Module commands scaled down to respect the wheel speed ceiling
    pub saturation_events: u64,
    pub applied_corrections: u64,
    /// Corrections discarded for being older than the pose history
    pub stale_corrections: u64,
    /// Corrections with non-finite poses or non-positive trust
    pub rejected_corrections: u64,
    /// Heading sensors lost since the last reinit
    pub heading_faults: u32,
    pub heading_disagreements: u32,
    /// Ticks run with no live heading sensor
    pub unhealthy_heading_ticks: u64,
}

/// Periodic localization and control loop
pub struct DriveLoop<M: ModuleDriver, H: HeadingSource> {
    config: DriveConfig,
    modules: M,
    heading_source: H,
    fusion: HeadingFusion,
    kinematics: SwerveKinematics,
    estimator: PoseEstimator,
    planner: TrajectoryPlanner,
    controller: HolonomicController,
    veering: VeeringCorrection,
    corrections: Option<CorrectionQueue>,
    diagnostics: Diagnostics,
    fused: FusedHeading,
    /// A live heading reading has been fused at least once
    heading_seen: bool,
    achieved: ChassisVelocity,
    now: f64,
}

impl<M: ModuleDriver, H: HeadingSource> DriveLoop<M, H> {
    /// Validate `config` and build the loop
    ///
    /// Fails before any module is commanded if the geometry or tuning is
    /// unusable. The pose starts at identity.
    pub fn new(config: DriveConfig, mut modules: M, mut heading_source: H) -> Result<Self, DriveError> {
        config.validate()?;
        let kinematics = config.geometry.build_kinematics()?;
        let controller = HolonomicController::new(config.controller.clone(), config.heading.veering())?;

        let mut fusion = HeadingFusion::new(config.heading.fusion());
        let fused = fusion.sample_available(&heading_source.read());
        let estimator = PoseEstimator::new(
            kinematics.clone(),
            config.estimator.clone(),
            fused.heading,
            modules.positions(),
        );
        let achieved = kinematics.to_chassis_velocity(&modules.states());

        info!(
            track_width = config.geometry.track_width,
            wheelbase = config.geometry.wheelbase,
            max_wheel_speed = config.geometry.max_wheel_speed,
            "drive loop ready"
        );

        Ok(Self {
            planner: TrajectoryPlanner::new(&config.limits),
            veering: config.heading.veering(),
            config,
            modules,
            heading_source,
            fusion,
            kinematics,
            estimator,
            controller,
            corrections: None,
            diagnostics: Diagnostics::default(),
            heading_seen: fused.healthy,
            fused,
            achieved,
            now: 0.0,
        })
    }

    /// Drain pose corrections from `queue` on every tick
    pub fn attach_corrections(&mut self, queue: CorrectionQueue) {
        self.corrections = Some(queue);
    }

    /// Run one control period ending at `now` [s]
    ///
    /// Returns the body-frame command written to the modules, or `None`
    /// when no goal is active.
    pub fn tick(&mut self, now: f64) -> Option<ChassisVelocity> {
        self.now = now;
        self.diagnostics.ticks += 1;

        self.fused = self.fusion.sample_available(&self.heading_source.read());
        if !self.fused.healthy {
            self.diagnostics.unhealthy_heading_ticks += 1;
        } else if !self.heading_seen {
            // First reading after a late sensor start sets the reference, not a turn
            self.estimator.rebase_sensor_heading(self.fused.heading);
            self.heading_seen = true;
        }
        self.diagnostics.heading_faults = self.fusion.fault_count();
        self.diagnostics.heading_disagreements = self.fusion.disagreement_count();

        let positions = self.modules.positions();
        self.estimator.integrate(now, self.fused.heading, &positions);

        let pending = self
            .corrections
            .as_ref()
            .filter(|queue| queue.has_pending())
            .map(CorrectionQueue::drain)
            .unwrap_or_default();
        for correction in pending {
            self.apply_correction(&correction);
        }

        self.achieved = self.kinematics.to_chassis_velocity(&self.modules.states());

        if self.controller.status() == ControllerStatus::Idle {
            return None;
        }
        let pose = self.estimator.pose();
        let field_velocity = self.achieved.to_field_relative(pose.heading);
        let command = self
            .controller
            .calculate(now, &pose, &field_velocity, self.fused.rate);
        self.write_body(&command);
        Some(command)
    }

    /// Apply one correction immediately, outside the queue
    pub fn add_correction(&mut self, correction: &PoseCorrection) -> CorrectionOutcome {
        self.apply_correction(correction)
    }

    fn apply_correction(&mut self, correction: &PoseCorrection) -> CorrectionOutcome {
        let outcome = self.estimator.correct(correction);
        match outcome {
            CorrectionOutcome::Applied => self.diagnostics.applied_corrections += 1,
            CorrectionOutcome::Stale => self.diagnostics.stale_corrections += 1,
            CorrectionOutcome::Rejected => self.diagnostics.rejected_corrections += 1,
        }
        outcome
    }

    pub fn get_pose(&self) -> Pose2D {
        self.estimator.pose()
    }

    /// Set the pose estimate directly
    pub fn reset_pose(&mut self, pose: Pose2D) {
        self.estimator.reset_pose(pose);
    }

    /// Body-frame velocity achieved according to the module sensors
    pub fn get_chassis_velocity(&self) -> ChassisVelocity {
        self.achieved
    }

    /// Plan toward `goal` from the current estimate and start following it
    pub fn set_goal(&mut self, goal: Goal) -> Result<(), PlannerError> {
        let pose = self.estimator.pose();
        let field_velocity = self.achieved.to_field_relative(pose.heading);
        let start = PlanStart {
            pose,
            velocity: field_velocity,
        };
        let motion = self.planner.plan(&start, &goal)?;
        self.controller
            .set_goal(motion, self.now, &pose, &field_velocity);
        Ok(())
    }

    /// Goal using the configured speed limits
    ///
    /// The speed limit is capped at what the modules and the axis
    /// regulators can deliver, so the profile is never planned faster than
    /// the drivetrain can follow.
    pub fn go_to(&mut self, target: Pose2D) -> Result<(), PlannerError> {
        let mut goal = Goal::with_limits(target, &self.config.limits);
        goal.max_velocity = goal.max_velocity.min(self.deliverable_speed());
        self.set_goal(goal)
    }

    /// Highest per-axis speed both the wheels and the regulators can command [m/s]
    pub fn deliverable_speed(&self) -> f64 {
        self.config
            .geometry
            .max_wheel_speed
            .min(self.config.controller.axis.max_command)
    }

    /// Restart the active profile's clock at the last tick time
    pub fn start(&mut self) {
        self.controller.start(self.now);
    }

    pub fn cancel_goal(&mut self) {
        self.controller.cancel();
    }

    pub fn at_reference(&self) -> bool {
        self.controller.at_reference()
    }

    pub fn status(&self) -> ControllerStatus {
        self.controller.status()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.controller.set_enabled(enabled);
    }

    pub fn is_moving(&self) -> bool {
        self.achieved
            .is_moving(self.config.controller.moving_threshold)
    }

    /// Teleop drive from normalized stick inputs in [-1, 1]
    ///
    /// Small translation inputs are shaped quadratically instead of cut,
    /// small rotation inputs are zeroed. Cancels any active goal.
    pub fn drive(&mut self, x: f64, y: f64, rot: f64, field_relative: bool) {
        self.controller.cancel();

        let limits: SpeedLimits = self.config.limits;
        let vx = shape_translation(x) * limits.speed;
        let vy = shape_translation(y) * limits.speed;
        let omega = shape_rotation(rot) * limits.angular_speed;

        let body = if field_relative {
            let heading = self
                .veering
                .correct(self.estimator.pose().heading, self.fused.rate);
            ChassisVelocity::from_field_relative(vx, vy, omega, heading)
        } else {
            ChassisVelocity::new(vx, vy, omega)
        };
        self.write_body(&body);
    }

    /// Command module states directly, desaturated to the wheel speed ceiling
    pub fn set_module_states(&mut self, states: &ModuleStateSet) {
        let mut states = *states;
        self.write_states(&mut states);
    }

    fn write_body(&mut self, body: &ChassisVelocity) {
        let mut states = self.kinematics.to_module_states(body);
        let measured = self.modules.states();
        for (state, current) in states.iter_mut().zip(measured.iter()) {
            *state = state.optimize(current.angle);
        }
        self.write_states(&mut states);
    }

    fn write_states(&mut self, states: &mut ModuleStateSet) {
        if let Some(scale) = desaturate(states, self.config.geometry.max_wheel_speed) {
            self.diagnostics.saturation_events += 1;
            debug!(scale, "module command saturated");
        }
        self.modules.set_desired_states(states);
    }

    pub fn fused_heading(&self) -> FusedHeading {
        self.fused
    }

    /// Clear sticky heading sensor faults
    pub fn reinit_heading(&mut self) {
        self.fusion.reinit();
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn controller(&self) -> &HolonomicController {
        &self.controller
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn modules(&self) -> &M {
        &self.modules
    }
}

fn shape_translation(input: f64) -> f64 {
    let input = input.clamp(-1.0, 1.0);
    if input.abs() < TELEOP_DEADBAND {
        100.0 * input * input * input.signum()
    } else {
        input
    }
}

fn shape_rotation(input: f64) -> f64 {
    let input = input.clamp(-1.0, 1.0);
    if input.abs() < TELEOP_DEADBAND {
        0.0
    } else {
        input
    }
}
