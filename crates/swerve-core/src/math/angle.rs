//! Planar angle utilities
//!
//! All headings in this workspace are radians in the canonical range (-π, π].
//! Subtraction of headings must go through [`angle_difference`] so that a
//! pair like +179° / -179° compares as 2° apart rather than 358°.

use std::f64::consts::{PI, TAU};

/// Wrap an angle into (-π, π]
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Shortest signed rotation taking `from` to `to`, in (-π, π]
pub fn angle_difference(to: f64, from: f64) -> f64 {
    normalize_angle(to - from)
}

/// Unwrap `target` so it lies within half a turn of `reference`
///
/// The result may be outside (-π, π]; it is meant for profiling a rotation
/// along the shorter arc.
pub fn unwrap_toward(target: f64, reference: f64) -> f64 {
    reference + angle_difference(target, reference)
}

/// Mean of a set of headings, wrap-aware
///
/// Every heading is first unwrapped into the same cycle as the first one,
/// then averaged arithmetically. Returns `None` for an empty input.
pub fn mean_angle(angles: &[f64]) -> Option<f64> {
    let (&first, rest) = angles.split_first()?;
    let sum = rest
        .iter()
        .fold(first, |acc, &a| acc + unwrap_toward(a, first));
    Some(normalize_angle(sum / angles.len() as f64))
}
