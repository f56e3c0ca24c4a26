//! Drive-to-goal demonstration
//!
//! Runs the full control loop against the simulated drivetrain:
//! - noisy redundant heading sensors, one of which drops out mid-run
//! - vision fixes every 200 ms with 60 ms latency
//! - two goals, the second issued while the first is still running
//!
//! Usage: `cargo run --example drive_to_goal [config.toml]`
//! Set `RUST_LOG=debug` for per-tick detail.

use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_2;

use swerve_core::estimation::PoseCorrection;
use swerve_core::math::Pose2D;
use swerve_core::simulation::{SimConfig, SwerveSimulator};
use swerve_planner::hardware::SharedSimulator;
use swerve_planner::{correction_channel, ControllerStatus, DriveConfig, DriveLoop};
use tracing_subscriber::EnvFilter;

const VISION_PERIOD_TICKS: usize = 10;
const VISION_LATENCY_TICKS: usize = 3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => DriveConfig::load(path)?,
        None => DriveConfig::default(),
    };
    let dt = config.controller.period;

    println!("=== Swerve Drive To Goal ===\n");

    let kinematics = config.geometry.build_kinematics()?;
    let sim_config = SimConfig {
        dt,
        ..SimConfig::default()
    }
    .with_dropout(0, 3.0);
    let sim = SharedSimulator::new(SwerveSimulator::new(kinematics, sim_config));

    let mut drive = DriveLoop::new(config, sim.clone(), sim.clone())?;
    let (vision, queue) = correction_channel(swerve_planner::corrections::CORRECTION_CAPACITY);
    drive.attach_corrections(queue);

    drive.go_to(Pose2D::new(5.0, 0.0, 0.0))?;
    println!("Goal 1: (5.0, 0.0, 0°)");

    let mut replanned = false;
    let mut truth_history = VecDeque::with_capacity(VISION_LATENCY_TICKS + 1);
    for tick in 1..=600 {
        sim.step();
        let now = tick as f64 * dt;

        truth_history.push_back(sim.with(|s| s.true_pose()));
        if truth_history.len() > VISION_LATENCY_TICKS + 1 {
            truth_history.pop_front();
        }
        if tick % VISION_PERIOD_TICKS == 0 {
            if let Some(&seen) = truth_history.front() {
                let age = (truth_history.len() - 1) as f64 * dt;
                vision.send(PoseCorrection::new(seen, age, 0.8));
            }
        }

        drive.tick(now);

        if !replanned && now >= 1.5 {
            drive.go_to(Pose2D::new(3.0, 2.0, FRAC_PI_2))?;
            println!("Goal 2 at t = {now:.2} s: (3.0, 2.0, 90°)");
            replanned = true;
        }

        if tick % 50 == 0 {
            let pose = drive.get_pose();
            let truth = sim.with(|s| s.true_pose());
            println!(
                "t = {:5.2} s  est = ({:6.3}, {:6.3}, {:7.2}°)  true = ({:6.3}, {:6.3})  {:?}",
                now,
                pose.x,
                pose.y,
                pose.heading.to_degrees(),
                truth.x,
                truth.y,
                drive.status()
            );
        }

        if replanned && drive.status() == ControllerStatus::AtGoal && !drive.is_moving() {
            println!("\nSettled at t = {now:.2} s");
            break;
        }
    }

    let diagnostics = drive.diagnostics();
    println!("\n=== Diagnostics ===");
    println!("Ticks:                {}", diagnostics.ticks);
    println!("Saturation events:    {}", diagnostics.saturation_events);
    println!("Applied corrections:  {}", diagnostics.applied_corrections);
    println!("Stale corrections:    {}", diagnostics.stale_corrections);
    println!("Heading sensor faults: {}", diagnostics.heading_faults);
    println!("At reference:         {}", drive.at_reference());

    Ok(())
}
