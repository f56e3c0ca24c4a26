//! Swerve drive kinematics
//!
//! Inverse kinematics (chassis velocity to module states) for each module
//! at position r relative to the rotation center:
//!
//! ```text
//! v_module = v + ω × r = [vx - ω·r_y, vy + ω·r_x]
//! ```
//!
//! Forward kinematics is the least-squares solution of the same stacked
//! 8×3 system, so it also accepts module states that are not exactly
//! consistent with a rigid-body motion.

use nalgebra::{Matrix3, SMatrix, SVector, Vector2};
use thiserror::Error;
use tracing::debug;

use super::chassis::ChassisVelocity;
use super::module::{ModulePositionSet, ModuleState, ModuleStateSet, MODULE_COUNT};
use crate::math::Twist2D;

type ForwardMatrix = SMatrix<f64, { 2 * MODULE_COUNT }, 3>;
type InverseMatrix = SMatrix<f64, 3, { 2 * MODULE_COUNT }>;
type ModuleVector = SVector<f64, { 2 * MODULE_COUNT }>;

/// Below this wheel speed a module keeps its previous steering angle
const STOPPED_SPEED: f64 = 1e-6;

/// Configuration errors in the module layout
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Expected {expected} modules, got {got}")]
    ModuleCount { expected: usize, got: usize },
    #[error("Module {index} position is not finite")]
    NonFinitePosition { index: usize },
    #[error("Modules {first} and {second} share the same position")]
    CoincidentModules { first: usize, second: usize },
    #[error("Module layout cannot observe rotation (rank-deficient geometry)")]
    Degenerate,
    #[error("Track width and wheelbase must be positive, got {track_width} x {wheelbase}")]
    NonPhysicalDimensions { track_width: f64, wheelbase: f64 },
    #[error("Maximum wheel speed must be positive, got {0}")]
    InvalidMaxSpeed(f64),
}

/// Bidirectional mapping between chassis velocity and module states
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    /// Module positions relative to the rotation center [m]
    locations: [Vector2<f64>; MODULE_COUNT],
    forward: ForwardMatrix,
    inverse: InverseMatrix,
    /// Steering angles held while the vehicle is stopped
    last_angles: [f64; MODULE_COUNT],
}

impl SwerveKinematics {
    /// Build kinematics from module positions in the fixed module order
    pub fn new(locations: &[Vector2<f64>]) -> Result<Self, GeometryError> {
        if locations.len() != MODULE_COUNT {
            return Err(GeometryError::ModuleCount {
                expected: MODULE_COUNT,
                got: locations.len(),
            });
        }

        for (index, loc) in locations.iter().enumerate() {
            if !loc.x.is_finite() || !loc.y.is_finite() {
                return Err(GeometryError::NonFinitePosition { index });
            }
        }

        for first in 0..MODULE_COUNT {
            for second in (first + 1)..MODULE_COUNT {
                if (locations[first] - locations[second]).norm() < 1e-6 {
                    return Err(GeometryError::CoincidentModules { first, second });
                }
            }
        }

        let mut forward = ForwardMatrix::zeros();
        for (i, loc) in locations.iter().enumerate() {
            forward[(2 * i, 0)] = 1.0;
            forward[(2 * i, 2)] = -loc.y;
            forward[(2 * i + 1, 1)] = 1.0;
            forward[(2 * i + 1, 2)] = loc.x;
        }

        // Least-squares inverse: (AᵀA)⁻¹Aᵀ
        let normal: Matrix3<f64> = forward.transpose() * forward;
        if normal.determinant().abs() < 1e-9 {
            return Err(GeometryError::Degenerate);
        }
        let normal_inv = normal.try_inverse().ok_or(GeometryError::Degenerate)?;
        let inverse = normal_inv * forward.transpose();

        let mut fixed = [Vector2::zeros(); MODULE_COUNT];
        fixed.copy_from_slice(locations);

        Ok(Self {
            locations: fixed,
            forward,
            inverse,
            last_angles: [0.0; MODULE_COUNT],
        })
    }

    /// Rectangular layout centered on the rotation center
    ///
    /// `track_width` is the left-right module spacing, `wheelbase` the
    /// front-back spacing. +x is forward, +y is left.
    pub fn rectangular(track_width: f64, wheelbase: f64) -> Result<Self, GeometryError> {
        if !(track_width > 0.0 && wheelbase > 0.0) {
            return Err(GeometryError::NonPhysicalDimensions {
                track_width,
                wheelbase,
            });
        }
        let hx = wheelbase / 2.0;
        let hy = track_width / 2.0;
        Self::new(&[
            Vector2::new(hx, hy),
            Vector2::new(hx, -hy),
            Vector2::new(-hx, hy),
            Vector2::new(-hx, -hy),
        ])
    }

    pub fn locations(&self) -> &[Vector2<f64>; MODULE_COUNT] {
        &self.locations
    }

    /// Module states for a body-frame chassis velocity
    ///
    /// When the chassis is commanded to stop, each module keeps the angle
    /// it last had so the wheels do not snap back to zero.
    pub fn to_module_states(&mut self, velocity: &ChassisVelocity) -> ModuleStateSet {
        let chassis = nalgebra::Vector3::new(velocity.vx, velocity.vy, velocity.omega);
        let module_vec: ModuleVector = self.forward * chassis;

        let mut states = [ModuleState::default(); MODULE_COUNT];
        for (i, state) in states.iter_mut().enumerate() {
            let vx = module_vec[2 * i];
            let vy = module_vec[2 * i + 1];
            let speed = vx.hypot(vy);
            let angle = if speed > STOPPED_SPEED {
                vy.atan2(vx)
            } else {
                self.last_angles[i]
            };
            *state = ModuleState::new(angle, speed);
            self.last_angles[i] = state.angle;
        }
        states
    }

    /// Body-frame chassis velocity that best explains the given module states
    pub fn to_chassis_velocity(&self, states: &ModuleStateSet) -> ChassisVelocity {
        let mut module_vec = ModuleVector::zeros();
        for (i, state) in states.iter().enumerate() {
            module_vec[2 * i] = state.speed * state.angle.cos();
            module_vec[2 * i + 1] = state.speed * state.angle.sin();
        }
        let chassis = self.inverse * module_vec;
        ChassisVelocity::new(chassis[0], chassis[1], chassis[2])
    }

    /// Body-frame displacement between two odometry samples
    ///
    /// Each module's travel is taken along its current steering angle.
    pub fn to_twist(&self, previous: &ModulePositionSet, current: &ModulePositionSet) -> Twist2D {
        let mut module_vec = ModuleVector::zeros();
        for (i, (prev, curr)) in previous.iter().zip(current.iter()).enumerate() {
            let travel = curr.distance - prev.distance;
            module_vec[2 * i] = travel * curr.angle.cos();
            module_vec[2 * i + 1] = travel * curr.angle.sin();
        }
        let chassis = self.inverse * module_vec;
        Twist2D::new(chassis[0], chassis[1], chassis[2])
    }
}

/// Scale all module speeds so none exceeds `max_speed`
///
/// Every module is scaled by the same factor, preserving direction and
/// relative speeds. Returns the factor applied, or `None` when the set was
/// already within the limit.
pub fn desaturate(states: &mut ModuleStateSet, max_speed: f64) -> Option<f64> {
    let largest = states
        .iter()
        .map(|s| s.speed.abs())
        .fold(0.0_f64, f64::max);

    if largest <= max_speed || largest <= 0.0 {
        return None;
    }

    let scale = max_speed / largest;
    for state in states.iter_mut() {
        state.speed *= scale;
    }
    debug!(largest, max_speed, scale, "desaturated module speeds");
    Some(scale)
}
