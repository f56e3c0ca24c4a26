//! Closed-loop behavior of the full drive loop against the simulator

use std::f64::consts::FRAC_PI_2;

use approx::assert_relative_eq;
use swerve_core::control::MotionState;
use swerve_core::estimation::PoseCorrection;
use swerve_core::math::{angle_difference, Pose2D};
use swerve_core::simulation::{SimConfig, SwerveSimulator};
use swerve_planner::hardware::SharedSimulator;
use swerve_planner::profile::ProfileConstraints;
use swerve_planner::{
    correction_channel, AxisProfile, ControllerStatus, DriveConfig, DriveLoop, Goal,
};

struct Harness {
    drive: DriveLoop<SharedSimulator, SharedSimulator>,
    sim: SharedSimulator,
    tick: usize,
    dt: f64,
}

impl Harness {
    fn new(sim_config: SimConfig) -> Self {
        let config = DriveConfig::default();
        let dt = config.controller.period;
        let kinematics = config.geometry.build_kinematics().unwrap();
        let sim = SharedSimulator::new(SwerveSimulator::new(kinematics, SimConfig { dt, ..sim_config }));
        let drive = DriveLoop::new(config, sim.clone(), sim.clone()).unwrap();
        Self {
            drive,
            sim,
            tick: 0,
            dt,
        }
    }

    fn now(&self) -> f64 {
        self.tick as f64 * self.dt
    }

    fn step(&mut self) {
        self.sim.step();
        self.tick += 1;
        let now = self.now();
        self.drive.tick(now);
    }

    /// Step until `done` or `seconds` elapse; returns whether `done` held
    fn run_until(&mut self, seconds: f64, mut done: impl FnMut(&Self) -> bool) -> bool {
        let steps = (seconds / self.dt).round() as usize;
        for _ in 0..steps {
            self.step();
            if done(self) {
                return true;
            }
        }
        false
    }

    fn true_pose(&self) -> Pose2D {
        self.sim.with(|s| s.true_pose())
    }
}

fn goal(x: f64, y: f64, heading: f64) -> Goal {
    Goal::new(Pose2D::new(x, y, heading), 2.0, 2.0)
}

#[test]
fn test_reaches_and_holds_goal() {
    let mut h = Harness::new(SimConfig::ideal());
    h.drive.set_goal(goal(5.0, 0.0, 0.0)).unwrap();
    h.drive.start();

    assert_eq!(h.drive.status(), ControllerStatus::Running);
    assert!(!h.drive.at_reference());

    assert!(h.run_until(10.0, |h| h.drive.at_reference()));
    assert_eq!(h.drive.status(), ControllerStatus::AtGoal);
    // Profile takes 3.5 s; arrival cannot beat it by much
    assert!(h.now() > 3.0);

    // Holding position: stays at reference with no new goal
    for _ in 0..100 {
        h.step();
        assert!(h.drive.at_reference());
    }
    assert!(h.true_pose().distance(&Pose2D::new(5.0, 0.0, 0.0)) < 0.05);
    assert!(!h.drive.is_moving());
}

#[test]
fn test_turns_while_translating() {
    let mut h = Harness::new(SimConfig::ideal());
    h.drive.set_goal(goal(2.0, 1.0, FRAC_PI_2)).unwrap();

    assert!(h.run_until(10.0, |h| h.drive.at_reference()));
    let pose = h.drive.get_pose();
    assert_relative_eq!(pose.heading, FRAC_PI_2, epsilon = 2f64.to_radians());
    assert!(pose.distance(&Pose2D::new(2.0, 1.0, 0.0)) < 0.05);
}

#[test]
fn test_heading_sensor_loss_mid_run() {
    let mut h = Harness::new(SimConfig::ideal().with_dropout(0, 1.0));
    h.drive.set_goal(goal(3.0, -1.0, -FRAC_PI_2)).unwrap();

    assert!(h.run_until(10.0, |h| h.drive.at_reference()));
    let diagnostics = h.drive.diagnostics();
    assert_eq!(diagnostics.heading_faults, 1);
    assert_eq!(diagnostics.unhealthy_heading_ticks, 0);
    assert!(h.drive.fused_heading().healthy);

    let truth = h.true_pose();
    assert!(truth.distance(&Pose2D::new(3.0, -1.0, 0.0)) < 0.06);
    assert!(angle_difference(truth.heading, -FRAC_PI_2).abs() < 3f64.to_radians());
}

#[test]
fn test_vision_pulls_drifted_estimate() {
    let mut h = Harness::new(SimConfig::ideal());
    let (vision, queue) = correction_channel(8);
    h.drive.attach_corrections(queue);

    // The robot actually starts half a metre ahead of where it believes
    h.sim.with(|s| s.set_pose(Pose2D::new(0.5, 0.0, 0.0)));
    h.drive.set_goal(goal(3.0, 0.0, 0.0)).unwrap();

    for tick in 1..=400 {
        if tick % 10 == 0 {
            assert!(vision.send(PoseCorrection::new(h.true_pose(), 0.0, 1.0)));
        }
        h.step();
    }

    let diagnostics = h.drive.diagnostics();
    assert_eq!(diagnostics.applied_corrections, 40);
    assert_eq!(diagnostics.stale_corrections, 0);
    assert!(h.drive.get_pose().distance(&h.true_pose()) < 0.05);
    assert!(h.true_pose().distance(&Pose2D::new(3.0, 0.0, 0.0)) < 0.1);
}

#[test]
fn test_stale_correction_discarded() {
    let mut h = Harness::new(SimConfig::ideal());
    h.run_until(0.5, |_| false);

    let before = h.drive.get_pose();
    let old = PoseCorrection::new(Pose2D::new(4.0, 4.0, 0.0), 5.0, 1.0);
    h.drive.add_correction(&old);

    assert_eq!(h.drive.diagnostics().stale_corrections, 1);
    assert_eq!(h.drive.get_pose(), before);
}

#[test]
fn test_replan_continues_from_current_state() {
    let mut h = Harness::new(SimConfig::ideal());
    h.drive.set_goal(goal(5.0, 0.0, 0.0)).unwrap();
    h.run_until(1.5, |_| false);

    let pose = h.drive.get_pose();
    h.drive.set_goal(goal(1.0, 2.0, 0.0)).unwrap();
    assert_eq!(h.drive.status(), ControllerStatus::Running);
    let motion = h.drive.controller().motion().unwrap();
    assert_relative_eq!(motion.x.sample(0.0).position, pose.x, epsilon = 1e-9);
    assert!(motion.x.sample(0.0).velocity > 1.0);

    h.step();
    let reference = h.drive.controller().reference();
    assert!((reference.x.position - pose.x).abs() < 0.1);

    assert!(h.run_until(10.0, |h| h.drive.at_reference()));
}

#[test]
fn test_disabled_feedback_still_follows_profile() {
    let mut h = Harness::new(SimConfig::ideal());
    h.drive.set_goal(goal(2.0, 0.0, 0.0)).unwrap();
    h.drive.set_enabled(false);
    h.run_until(1.0, |_| false);
    assert!(h.drive.get_pose().x > 0.3);

    h.drive.set_enabled(true);
    assert!(h.run_until(10.0, |h| h.drive.at_reference()));
}

#[test]
fn test_profile_respects_limits() {
    let constraints = ProfileConstraints::new(2.0, 2.0, None);
    let profile = AxisProfile::generate(MotionState::at_rest(0.0), 5.0, &constraints).unwrap();

    let mut t = 0.0;
    while t <= profile.duration() {
        let s = profile.sample(t);
        assert!(s.velocity.abs() <= 2.0 + 1e-9);
        assert!(s.acceleration.abs() <= 2.0 + 1e-9);
        t += 0.005;
    }
}
