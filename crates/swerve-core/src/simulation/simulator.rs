//! Swerve drivetrain simulator
//!
//! The chassis tracks the commanded velocity through a first-order lag in
//! the field frame. Module states and distances are derived from the
//! chassis motion through the same kinematics the controller uses, so
//! with ideal sensors odometry reproduces the true pose exactly.

use tracing::{debug, info};

use super::config::SimConfig;
use super::sensors::SimulatedHeadingSensor;
use crate::kinematics::{
    ChassisVelocity, ModulePosition, ModulePositionSet, ModuleStateSet, SwerveKinematics,
    MODULE_COUNT,
};
use crate::math::{Pose2D, Twist2D};
use crate::sensors::{HeadingSample, HEADING_SENSOR_COUNT};

/// Simulated drivetrain with redundant heading sensors
#[derive(Debug, Clone)]
pub struct SwerveSimulator {
    config: SimConfig,
    kinematics: SwerveKinematics,
    time: f64,
    pose: Pose2D,
    /// Field-frame chassis velocity
    field_velocity: ChassisVelocity,
    /// Body-frame command
    command: ChassisVelocity,
    module_states: ModuleStateSet,
    module_positions: ModulePositionSet,
    sensors: [SimulatedHeadingSensor; HEADING_SENSOR_COUNT],
}

impl SwerveSimulator {
    pub fn new(kinematics: SwerveKinematics, config: SimConfig) -> Self {
        let mut sensors = [0u8, 1u8].map(|id| {
            SimulatedHeadingSensor::new(
                id,
                config.heading_noise,
                config.rate_noise,
                config.seed.wrapping_add(id as u64),
            )
        });
        for dropout in &config.dropouts {
            if let Some(sensor) = sensors.get_mut(dropout.sensor) {
                sensor.drop_out_at(dropout.at_time);
            }
        }

        Self {
            config,
            kinematics,
            time: 0.0,
            pose: Pose2D::identity(),
            field_velocity: ChassisVelocity::zero(),
            command: ChassisVelocity::zero(),
            module_states: Default::default(),
            module_positions: [ModulePosition::default(); MODULE_COUNT],
            sensors,
        }
    }

    /// Place the robot without touching odometry
    pub fn set_pose(&mut self, pose: Pose2D) {
        self.pose = pose;
    }

    /// Command the modules; takes effect from the next step
    pub fn command(&mut self, states: &ModuleStateSet) {
        self.command = self.kinematics.to_chassis_velocity(states);
    }

    /// Advance one step
    pub fn step(&mut self) {
        let dt = self.config.dt;
        let tau = self.config.drive_time_constant.max(1e-6);
        let decay = (-dt / tau).exp();
        // Mean of the lagged velocity over the step
        let mean_weight = tau * (1.0 - decay) / dt;

        let target = self.command.to_field_relative(self.pose.heading);
        let start = self.field_velocity;
        let lag = |v0: f64, u: f64| (u + (v0 - u) * mean_weight, u + (v0 - u) * decay);

        let (mean_vx, end_vx) = lag(start.vx, target.vx);
        let (mean_vy, end_vy) = lag(start.vy, target.vy);
        let (mean_omega, end_omega) = lag(start.omega, target.omega);

        let mean_body =
            ChassisVelocity::from_field_relative(mean_vx, mean_vy, mean_omega, self.pose.heading);
        let twist = Twist2D::new(mean_body.vx * dt, mean_body.vy * dt, mean_body.omega * dt);
        self.pose = self.pose.exp(&twist);

        let travel = self.kinematics.to_module_states(&mean_body);
        for (position, state) in self.module_positions.iter_mut().zip(travel.iter()) {
            position.distance += state.speed * dt;
            position.angle = state.angle;
        }

        self.field_velocity = ChassisVelocity::new(end_vx, end_vy, end_omega);
        let body = self.body_velocity();
        self.module_states = self.kinematics.to_module_states(&body);
        self.time += dt;

        if self.sensors.iter().any(|s| {
            s.is_connected(self.time - dt) && !s.is_connected(self.time)
        }) {
            info!(time = self.time, "simulated heading sensor dropped out");
        }
        debug!(time = self.time, x = self.pose.x, y = self.pose.y, heading = self.pose.heading, "sim step");
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dt(&self) -> f64 {
        self.config.dt
    }

    /// Ground truth pose
    pub fn true_pose(&self) -> Pose2D {
        self.pose
    }

    /// Ground truth body-frame chassis velocity
    pub fn body_velocity(&self) -> ChassisVelocity {
        ChassisVelocity::from_field_relative(
            self.field_velocity.vx,
            self.field_velocity.vy,
            self.field_velocity.omega,
            self.pose.heading,
        )
    }

    /// Measured module speeds and angles
    pub fn module_states(&self) -> ModuleStateSet {
        self.module_states
    }

    /// Measured module distances and angles
    pub fn module_positions(&self) -> ModulePositionSet {
        self.module_positions
    }

    /// One reading from each heading sensor
    pub fn heading_samples(&mut self) -> [HeadingSample; HEADING_SENSOR_COUNT] {
        let (time, heading, rate) = (self.time, self.pose.heading, self.field_velocity.omega);
        [
            self.sensors[0].measure(time, heading, rate),
            self.sensors[1].measure(time, heading, rate),
        ]
    }

    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }
}
