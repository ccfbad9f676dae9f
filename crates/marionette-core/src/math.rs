//! Geometric helpers shared by the constraint and solver crates.
//!
//! All routines are total: degenerate inputs (zero-length or collinear
//! vectors) fall back to an arbitrary orthogonal axis or the identity
//! rotation instead of failing.

use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};

/// Length below which a vector is treated as zero.
pub const EPSILON: f32 = 1e-6;

/// An arbitrary unit vector orthogonal to `v`.
///
/// Deterministic: the same input always yields the same axis. Falls back to
/// `+X` when `v` itself is (near) zero.
#[must_use]
pub fn perpendicular(v: &Vector3<f32>) -> Unit<Vector3<f32>> {
    if v.norm_squared() < EPSILON * EPSILON {
        return Vector3::x_axis();
    }
    // Cross with the basis axis least aligned with v.
    let reference = if v.x.abs() < v.y.abs() && v.x.abs() < v.z.abs() {
        Vector3::x()
    } else if v.y.abs() < v.z.abs() {
        Vector3::y()
    } else {
        Vector3::z()
    };
    Unit::new_normalize(v.cross(&reference))
}

/// Shortest-arc rotation taking direction `from` onto direction `to`.
///
/// Antiparallel inputs rotate half a turn about an arbitrary perpendicular
/// axis; degenerate inputs yield the identity.
#[must_use]
pub fn shortest_arc(from: &Vector3<f32>, to: &Vector3<f32>) -> UnitQuaternion<f32> {
    if from.norm_squared() < EPSILON * EPSILON || to.norm_squared() < EPSILON * EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::rotation_between(from, to)
        .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&perpendicular(from), std::f32::consts::PI))
}

/// Project `v` onto the plane with unit normal `normal`.
#[must_use]
pub fn project_onto_plane(v: &Vector3<f32>, normal: &Unit<Vector3<f32>>) -> Vector3<f32> {
    v - normal.into_inner() * v.dot(&normal.into_inner())
}

/// Scale a rotation to a fraction of its angle about the same axis.
///
/// `scale_rotation(q, 0.0)` is the identity, `scale_rotation(q, 1.0)` is `q`.
#[must_use]
pub fn scale_rotation(q: &UnitQuaternion<f32>, fraction: f32) -> UnitQuaternion<f32> {
    q.powf(fraction)
}

/// Decompose `q` into `(swing, twist)` about `axis`, with `q = swing * twist`.
///
/// `twist` is the component of `q` rotating about `axis`; `swing` is the
/// remainder tilting the axis itself.
#[must_use]
pub fn swing_twist(
    q: &UnitQuaternion<f32>,
    axis: &Unit<Vector3<f32>>,
) -> (UnitQuaternion<f32>, UnitQuaternion<f32>) {
    let rotation_axis = q.imag();
    let projected = axis.into_inner() * rotation_axis.dot(&axis.into_inner());
    let twist_raw = Quaternion::from_parts(q.scalar(), projected);
    if twist_raw.norm_squared() < EPSILON * EPSILON {
        // Pure half-turn swing orthogonal to the axis.
        return (*q, UnitQuaternion::identity());
    }
    let twist = UnitQuaternion::from_quaternion(twist_raw);
    let swing = q * twist.inverse();
    (swing, twist)
}

/// Signed rotation angle of `q`'s twist component about `axis`, in
/// `[-pi, pi]`.
#[must_use]
pub fn twist_angle(q: &UnitQuaternion<f32>, axis: &Unit<Vector3<f32>>) -> f32 {
    let (_, twist) = swing_twist(q, axis);
    match twist.axis() {
        Some(twist_axis) => twist.angle() * twist_axis.dot(&axis.into_inner()).signum(),
        None => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
