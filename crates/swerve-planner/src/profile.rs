//! Single-axis motion profiles
//!
//! An [`AxisProfile`] moves one coordinate from a start state to a goal
//! position and stops there, in minimum time under velocity, acceleration
//! and (optionally) jerk limits. Without a jerk limit the profile is
//! trapezoidal; with one, every acceleration change is ramped (S-curve).
//!
//! The profile is a list of constant-jerk segments evaluated in closed
//! form, so sampling is exact at any time. It is immutable once generated.

use serde::{Deserialize, Serialize};
use swerve_core::control::MotionState;
use thiserror::Error;

const BISECTION_STEPS: usize = 80;

/// Profile generation errors
#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("Invalid constraints: {0}")]
    InvalidConstraints(String),
    #[error("Start state or goal is not finite")]
    NonFinite,
}

/// Kinematic limits for one axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileConstraints {
    pub max_velocity: f64,
    pub max_acceleration: f64,
    /// `None` plans a trapezoidal profile
    pub max_jerk: Option<f64>,
}

impl ProfileConstraints {
    pub fn new(max_velocity: f64, max_acceleration: f64, max_jerk: Option<f64>) -> Self {
        Self {
            max_velocity,
            max_acceleration,
            max_jerk,
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        let positive = |v: f64| v > 0.0 && v.is_finite();
        if !positive(self.max_velocity) {
            return Err(ProfileError::InvalidConstraints(format!(
                "max velocity must be positive, got {}",
                self.max_velocity
            )));
        }
        if !positive(self.max_acceleration) {
            return Err(ProfileError::InvalidConstraints(format!(
                "max acceleration must be positive, got {}",
                self.max_acceleration
            )));
        }
        if let Some(jerk) = self.max_jerk {
            if !positive(jerk) {
                return Err(ProfileError::InvalidConstraints(format!(
                    "max jerk must be positive, got {jerk}"
                )));
            }
        }
        Ok(())
    }

    /// Time to change velocity by `dv` starting and ending at zero acceleration
    fn change_time(&self, dv: f64) -> f64 {
        let dv = dv.abs();
        let a = self.max_acceleration;
        match self.max_jerk {
            None => dv / a,
            Some(j) if dv >= a * a / j => dv / a + a / j,
            Some(j) => 2.0 * (dv / j).sqrt(),
        }
    }

    /// Distance covered while changing velocity from `v0` to `v1`
    ///
    /// Every velocity change has a point-symmetric velocity curve, so the
    /// mean velocity is the midpoint.
    fn change_distance(&self, v0: f64, v1: f64) -> f64 {
        0.5 * (v0 + v1) * self.change_time(v1 - v0)
    }
}

/// Constant-jerk piece of a profile
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start_time: f64,
    start: MotionState,
    jerk: f64,
    duration: f64,
}

impl Segment {
    fn at(&self, t: f64) -> MotionState {
        let s = &self.start;
        MotionState::new(
            s.position + s.velocity * t + s.acceleration * t * t / 2.0 + self.jerk * t * t * t / 6.0,
            s.velocity + s.acceleration * t + self.jerk * t * t / 2.0,
            s.acceleration + self.jerk * t,
        )
    }

    fn end(&self) -> MotionState {
        self.at(self.duration)
    }
}

/// Acceleration at the start of a phase and the jerk held through it
#[derive(Debug, Clone, Copy)]
struct Phase {
    acceleration: f64,
    jerk: f64,
    duration: f64,
}

/// Time-parameterized motion of one axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisProfile {
    segments: Vec<Segment>,
    start: MotionState,
    goal: f64,
    duration: f64,
}

impl AxisProfile {
    /// Minimum-time profile from `start` to rest at `goal`
    ///
    /// The start acceleration is taken as zero.
    pub fn generate(
        start: MotionState,
        goal: f64,
        constraints: &ProfileConstraints,
    ) -> Result<Self, ProfileError> {
        constraints.validate()?;
        if !(start.position.is_finite() && start.velocity.is_finite() && goal.is_finite()) {
            return Err(ProfileError::NonFinite);
        }

        let mut segments = Vec::new();
        let origin = MotionState::new(start.position, start.velocity, 0.0);
        append_phases(&mut segments, origin, &plan_phases(origin, goal, constraints));

        let duration = segments.last().map_or(0.0, |s| s.start_time + s.duration);
        Ok(Self {
            segments,
            start: origin,
            goal,
            duration,
        })
    }

    /// Profile that holds `position` with zero duration
    pub fn stationary(position: f64) -> Self {
        Self {
            segments: Vec::new(),
            start: MotionState::at_rest(position),
            goal: position,
            duration: 0.0,
        }
    }

    /// State at time `t` [s] since the profile started
    ///
    /// Before zero the start state is returned; after the end the goal
    /// is held at rest.
    pub fn sample(&self, t: f64) -> MotionState {
        if t <= 0.0 {
            return self.segments.first().map_or(self.start, |s| s.start);
        }
        if t >= self.duration {
            return MotionState::at_rest(self.goal);
        }
        let index = self
            .segments
            .partition_point(|s| s.start_time + s.duration < t)
            .min(self.segments.len().saturating_sub(1));
        match self.segments.get(index) {
            Some(segment) => segment.at(t - segment.start_time),
            None => MotionState::at_rest(self.goal),
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn goal(&self) -> f64 {
        self.goal
    }

    pub fn start(&self) -> MotionState {
        self.start
    }

    pub fn is_finished(&self, t: f64) -> bool {
        t >= self.duration
    }
}

/// Signed phases that take `start` to rest at `goal`
fn plan_phases(start: MotionState, goal: f64, c: &ProfileConstraints) -> Vec<Phase> {
    let distance = goal - start.position;
    let sign = if distance >= 0.0 { 1.0 } else { -1.0 };
    let remaining = distance.abs();
    let v0 = sign * start.velocity;
    let vmax = c.max_velocity;

    if remaining <= f64::EPSILON && v0.abs() <= f64::EPSILON {
        return Vec::new();
    }

    // Moving away from the goal, or unable to stop before it: stop, then
    // plan again from rest
    if v0 < 0.0 || c.change_distance(v0, 0.0) > remaining {
        let stop = signed(velocity_change(v0, 0.0, c), sign);
        let stop_at = start.position + sign * c.change_distance(v0, 0.0);
        let mut phases = stop;
        phases.extend(plan_phases(MotionState::at_rest(stop_at), goal, c));
        return phases;
    }

    let total = |vp: f64| c.change_distance(v0, vp) + c.change_distance(vp, 0.0);

    let peak = if total(vmax) <= remaining {
        vmax
    } else {
        // Peaking at v0 stops within the remaining distance, peaking at
        // vmax does not
        let (mut good, mut bad) = (v0, vmax);
        for _ in 0..BISECTION_STEPS {
            let mid = 0.5 * (good + bad);
            if total(mid) <= remaining {
                good = mid;
            } else {
                bad = mid;
            }
        }
        good
    };

    let mut phases = velocity_change(v0, peak, c);
    if peak > 0.0 {
        let cruise = (remaining - total(peak)) / peak;
        if cruise > 0.0 {
            phases.push(Phase {
                acceleration: 0.0,
                jerk: 0.0,
                duration: cruise,
            });
        }
    }
    phases.extend(velocity_change(peak, 0.0, c));
    signed(phases, sign)
}

fn signed(phases: Vec<Phase>, sign: f64) -> Vec<Phase> {
    phases
        .into_iter()
        .map(|p| Phase {
            acceleration: sign * p.acceleration,
            jerk: sign * p.jerk,
            duration: p.duration,
        })
        .collect()
}

/// Phases that change velocity from `v0` to `v1` at zero end acceleration
fn velocity_change(v0: f64, v1: f64, c: &ProfileConstraints) -> Vec<Phase> {
    let dv = v1 - v0;
    if dv.abs() <= f64::EPSILON {
        return Vec::new();
    }
    let s = dv.signum();
    let a = c.max_acceleration;

    match c.max_jerk {
        None => vec![Phase {
            acceleration: s * a,
            jerk: 0.0,
            duration: dv.abs() / a,
        }],
        Some(j) if dv.abs() >= a * a / j => {
            let ramp = a / j;
            let hold = dv.abs() / a - ramp;
            let mut phases = vec![Phase {
                acceleration: 0.0,
                jerk: s * j,
                duration: ramp,
            }];
            if hold > 0.0 {
                phases.push(Phase {
                    acceleration: s * a,
                    jerk: 0.0,
                    duration: hold,
                });
            }
            phases.push(Phase {
                acceleration: s * a,
                jerk: -s * j,
                duration: ramp,
            });
            phases
        }
        Some(j) => {
            let peak = (dv.abs() * j).sqrt();
            let ramp = peak / j;
            vec![
                Phase {
                    acceleration: 0.0,
                    jerk: s * j,
                    duration: ramp,
                },
                Phase {
                    acceleration: s * peak,
                    jerk: -s * j,
                    duration: ramp,
                },
            ]
        }
    }
}

fn append_phases(segments: &mut Vec<Segment>, origin: MotionState, phases: &[Phase]) {
    let mut time = 0.0;
    let mut state = origin;
    for phase in phases.iter().filter(|p| p.duration > 0.0) {
        let segment = Segment {
            start_time: time,
            start: MotionState::new(state.position, state.velocity, phase.acceleration),
            jerk: phase.jerk,
            duration: phase.duration,
        };
        state = segment.end();
        time += phase.duration;
        segments.push(segment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn trapezoid(v: f64, a: f64) -> ProfileConstraints {
        ProfileConstraints::new(v, a, None)
    }

    fn assert_bounded(profile: &AxisProfile, c: &ProfileConstraints) {
        let steps = (profile.duration() / 0.001).ceil() as usize;
        for i in 0..=steps {
            let s = profile.sample(i as f64 * 0.001);
            assert!(s.velocity.abs() <= c.max_velocity + 1e-9, "v = {}", s.velocity);
            assert!(s.acceleration.abs() <= c.max_acceleration + 1e-9, "a = {}", s.acceleration);
        }
    }

    #[test]
    fn test_trapezoid_reaches_goal() {
        let c = trapezoid(2.0, 2.0);
        let profile = AxisProfile::generate(MotionState::at_rest(0.0), 5.0, &c).unwrap();

        // 1 s ramp up, 1.5 s cruise, 1 s ramp down
        assert_relative_eq!(profile.duration(), 3.5, epsilon = 1e-9);
        assert_relative_eq!(profile.sample(1.0).velocity, 2.0, epsilon = 1e-9);
        assert_relative_eq!(profile.sample(2.0).position, 3.0, epsilon = 1e-9);

        let end = profile.sample(profile.duration() - 1e-9);
        assert_relative_eq!(end.position, 5.0, epsilon = 1e-6);
        assert_relative_eq!(end.velocity, 0.0, epsilon = 1e-6);
        assert_eq!(profile.sample(10.0), MotionState::at_rest(5.0));
        assert_bounded(&profile, &c);
    }

    #[test]
    fn test_triangle_when_too_short_to_cruise() {
        let c = trapezoid(2.0, 2.0);
        let profile = AxisProfile::generate(MotionState::at_rest(1.0), 0.0, &c).unwrap();

        // Peak velocity sqrt(a·d) = sqrt(2) never reaches the limit
        assert_relative_eq!(profile.duration(), 2.0 * 2f64.sqrt() / 2.0, epsilon = 1e-6);
        let mid = profile.sample(profile.duration() / 2.0);
        assert_relative_eq!(mid.velocity, -(2f64.sqrt()), epsilon = 1e-6);
        assert_relative_eq!(mid.position, 0.5, epsilon = 1e-6);
        assert_bounded(&profile, &c);
    }

    #[test]
    fn test_s_curve_limits_jerk() {
        let c = ProfileConstraints::new(2.0, 2.0, Some(4.0));
        let profile = AxisProfile::generate(MotionState::at_rest(0.0), 5.0, &c).unwrap();
        assert_bounded(&profile, &c);

        // Acceleration ramps instead of stepping
        assert_relative_eq!(profile.sample(0.1).acceleration, 0.4, epsilon = 1e-9);
        assert_relative_eq!(profile.sample(0.0).acceleration, 0.0);

        let mut previous = profile.sample(0.0).acceleration;
        let mut t = 0.001;
        while t < profile.duration() {
            let a = profile.sample(t).acceleration;
            assert!((a - previous).abs() <= 4.0 * 0.001 + 1e-9);
            previous = a;
            t += 0.001;
        }

        let end = profile.sample(profile.duration() - 1e-9);
        assert_relative_eq!(end.position, 5.0, epsilon = 1e-6);
        assert!(profile.duration() > 3.5);
    }

    #[test]
    fn test_s_curve_short_move() {
        let c = ProfileConstraints::new(2.0, 2.0, Some(4.0));
        let profile = AxisProfile::generate(MotionState::at_rest(0.0), 0.2, &c).unwrap();
        assert_bounded(&profile, &c);
        let end = profile.sample(profile.duration() - 1e-9);
        assert_relative_eq!(end.position, 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_starts_from_current_velocity() {
        let c = trapezoid(2.0, 2.0);
        let profile = AxisProfile::generate(MotionState::new(0.0, 1.0, 0.0), 5.0, &c).unwrap();
        assert_relative_eq!(profile.sample(0.0).velocity, 1.0);
        assert_relative_eq!(profile.sample(0.25).velocity, 1.5, epsilon = 1e-9);
        assert_bounded(&profile, &c);
    }

    #[test]
    fn test_reverses_when_moving_away() {
        let c = trapezoid(2.0, 2.0);
        let profile = AxisProfile::generate(MotionState::new(0.0, -1.0, 0.0), 1.0, &c).unwrap();

        // Stops at -0.25 after 0.5 s, then heads for the goal
        let stopped = profile.sample(0.5);
        assert_relative_eq!(stopped.position, -0.25, epsilon = 1e-9);
        assert_relative_eq!(stopped.velocity, 0.0, epsilon = 1e-9);
        let end = profile.sample(profile.duration() - 1e-9);
        assert_relative_eq!(end.position, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_overshoot_comes_back() {
        let c = trapezoid(3.0, 1.0);
        let profile = AxisProfile::generate(MotionState::new(0.0, 2.0, 0.0), 1.0, &c).unwrap();

        // Stopping from 2 m/s takes 2 m, past the goal
        let stopped = profile.sample(2.0);
        assert_relative_eq!(stopped.position, 2.0, epsilon = 1e-9);
        let end = profile.sample(profile.duration() - 1e-9);
        assert_relative_eq!(end.position, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_already_there() {
        let profile =
            AxisProfile::generate(MotionState::at_rest(2.0), 2.0, &trapezoid(1.0, 1.0)).unwrap();
        assert_eq!(profile.duration(), 0.0);
        assert_eq!(profile.sample(0.5), MotionState::at_rest(2.0));
        assert!(profile.is_finished(0.0));
    }

    #[test]
    fn test_invalid_constraints() {
        let start = MotionState::at_rest(0.0);
        assert!(AxisProfile::generate(start, 1.0, &trapezoid(0.0, 1.0)).is_err());
        assert!(AxisProfile::generate(start, 1.0, &trapezoid(1.0, -1.0)).is_err());
        assert!(
            AxisProfile::generate(start, 1.0, &ProfileConstraints::new(1.0, 1.0, Some(0.0)))
                .is_err()
        );
        assert_eq!(
            AxisProfile::generate(start, f64::NAN, &trapezoid(1.0, 1.0)),
            Err(ProfileError::NonFinite)
        );
    }
}
