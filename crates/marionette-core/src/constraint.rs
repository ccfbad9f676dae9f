//! Joint motion constraints.
//!
//! Constraints clamp a *proposed* local rotation or translation to the
//! nearest admissible one. The contract has one hard rule: a proposal that
//! is already admissible is returned unchanged, bit for bit. The clamp
//! never moves an admissible pose.
//!
//! All axes and limits are expressed in the joint's parent frame.

use nalgebra::{Unit, UnitQuaternion, Vector3};

use crate::math;

/// A joint motion constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Single-axis rotation with angular limits.
    Hinge(Hinge),
    /// Elliptical cone of swing about a rest axis, free twist.
    BallSocket(BallSocket),
    /// Spherical polygon of admissible swing directions, free twist.
    PolygonCone(PolygonCone),
    /// No motion at all.
    Fixed,
}

impl Constraint {
    /// Clamp a proposed local rotation to the nearest admissible one.
    ///
    /// `current` is the joint's present local rotation; `Fixed` joints
    /// return it untouched.
    #[must_use]
    pub fn constrain_rotation(
        &self,
        proposed: UnitQuaternion<f32>,
        current: UnitQuaternion<f32>,
    ) -> UnitQuaternion<f32> {
        match self {
            Self::Hinge(hinge) => hinge.constrain(proposed),
            Self::BallSocket(ball) => ball.constrain(proposed),
            Self::PolygonCone(cone) => cone.constrain(proposed),
            Self::Fixed => current,
        }
    }

    /// Clamp a proposed local translation to the nearest admissible one.
    ///
    /// Every variant here models a rotational (or locked) joint, so the
    /// translation stays at `current`; unconstrained joints accept any
    /// translation by not carrying a `Constraint` at all.
    #[must_use]
    pub fn constrain_translation(
        &self,
        _proposed: Vector3<f32>,
        current: Vector3<f32>,
    ) -> Vector3<f32> {
        current
    }

    /// The hinge rotation axis, if this is a hinge.
    #[must_use]
    pub const fn hinge_axis(&self) -> Option<&Unit<Vector3<f32>>> {
        match self {
            Self::Hinge(hinge) => Some(&hinge.axis),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Hinge
// ---------------------------------------------------------------------------

/// One-axis rotation limited to `[min_angle, max_angle]` radians.
#[derive(Debug, Clone, PartialEq)]
pub struct Hinge {
    /// Rotation axis in the parent frame.
    pub axis: Unit<Vector3<f32>>,
    /// Lower angle limit (radians).
    pub min_angle: f32,
    /// Upper angle limit (radians).
    pub max_angle: f32,
}

impl Hinge {
    /// Create a hinge about `axis` with the given angle limits.
    #[must_use]
    pub const fn new(axis: Unit<Vector3<f32>>, min_angle: f32, max_angle: f32) -> Self {
        Self {
            axis,
            min_angle,
            max_angle,
        }
    }

    fn constrain(&self, proposed: UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        let (swing, _) = math::swing_twist(&proposed, &self.axis);
        let angle = math::twist_angle(&proposed, &self.axis);
        let in_range = angle >= self.min_angle && angle <= self.max_angle;
        if in_range && swing.angle() < math::EPSILON {
            return proposed;
        }
        let clamped = angle.clamp(self.min_angle, self.max_angle);
        UnitQuaternion::from_axis_angle(&self.axis, clamped)
    }
}

// ---------------------------------------------------------------------------
// BallSocket
// ---------------------------------------------------------------------------

/// Ball-and-socket joint whose swing is limited to an elliptical cone.
///
/// The cone is centered on `axis` with four half-angles (radians): `up` and
/// `down` along the cone's vertical reference, `left` and `right` along the
/// horizontal one. Equal half-angles give a circular cone. Twist about the
/// swung axis is unrestricted.
#[derive(Debug, Clone, PartialEq)]
pub struct BallSocket {
    /// Rest direction of the joint in the parent frame.
    pub axis: Unit<Vector3<f32>>,
    pub up: f32,
    pub down: f32,
    pub left: f32,
    pub right: f32,
}

impl BallSocket {
    /// Create an elliptical swing cone about `axis`.
    #[must_use]
    pub const fn new(axis: Unit<Vector3<f32>>, up: f32, down: f32, left: f32, right: f32) -> Self {
        Self {
            axis,
            up,
            down,
            left,
            right,
        }
    }

    /// Circular cone with a single half-angle.
    #[must_use]
    pub const fn cone(axis: Unit<Vector3<f32>>, half_angle: f32) -> Self {
        Self::new(axis, half_angle, half_angle, half_angle, half_angle)
    }

    fn constrain(&self, proposed: UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        let swung = proposed * self.axis.into_inner();
        let polar = self.axis.angle(&swung);
        if polar < math::EPSILON {
            return proposed;
        }

        // Azimuth in the deterministic reference frame orthogonal to the axis.
        let horizontal = math::perpendicular(&self.axis);
        let vertical = Unit::new_normalize(self.axis.cross(&horizontal.into_inner()));
        let h = swung.dot(&horizontal.into_inner());
        let v = swung.dot(&vertical.into_inner());
        let azimuth = v.atan2(h);

        let (sin_a, cos_a) = azimuth.sin_cos();
        let h_limit = if cos_a >= 0.0 { self.right } else { self.left };
        let v_limit = if sin_a >= 0.0 { self.up } else { self.down };
        // Radius of the ellipse along this azimuth.
        let limit = ((cos_a / h_limit).powi(2) + (sin_a / v_limit).powi(2))
            .sqrt()
            .recip();

        if polar <= limit {
            return proposed;
        }

        // Pull the swing back onto the cone surface, keep the twist.
        let (_, twist) = math::swing_twist(&proposed, &self.axis);
        let swing_plane_normal = self.axis.cross(&swung);
        let swing_axis = if swing_plane_normal.norm_squared() < math::EPSILON * math::EPSILON {
            // Fully reversed swing: any direction out of the cone works.
            math::perpendicular(&self.axis)
        } else {
            Unit::new_normalize(swing_plane_normal)
        };
        let clamped_swing = UnitQuaternion::from_axis_angle(&swing_axis, limit);
        clamped_swing * twist
    }
}

// ---------------------------------------------------------------------------
// PolygonCone
// ---------------------------------------------------------------------------

/// Swing limited to a spherical polygon of unit directions around `axis`.
///
/// Vertices are rewound counterclockwise about the axis at construction, so
/// the inside test can rely on consistent edge orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonCone {
    axis: Unit<Vector3<f32>>,
    vertices: Vec<Unit<Vector3<f32>>>,
}

impl PolygonCone {
    /// Create a polygonal cone from at least three unit directions.
    ///
    /// Returns `None` with fewer than three vertices.
    #[must_use]
    pub fn new(axis: Unit<Vector3<f32>>, mut vertices: Vec<Unit<Vector3<f32>>>) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        // Enforce counterclockwise winding as seen along the axis.
        let signed_area: f32 = vertices
            .iter()
            .zip(vertices.iter().cycle().skip(1))
            .map(|(a, b)| a.cross(&b.into_inner()).dot(&axis.into_inner()))
            .sum();
        if signed_area < 0.0 {
            vertices.reverse();
        }
        Some(Self { axis, vertices })
    }

    /// The cone's central axis.
    #[must_use]
    pub const fn axis(&self) -> &Unit<Vector3<f32>> {
        &self.axis
    }

    /// The polygon vertices, counterclockwise about the axis.
    #[must_use]
    pub fn vertices(&self) -> &[Unit<Vector3<f32>>] {
        &self.vertices
    }

    fn contains(&self, direction: &Vector3<f32>) -> bool {
        self.vertices
            .iter()
            .zip(self.vertices.iter().cycle().skip(1))
            .all(|(a, b)| a.cross(&b.into_inner()).dot(direction) >= -math::EPSILON)
    }

    fn constrain(&self, proposed: UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        let swung = proposed * self.axis.into_inner();
        if self.contains(&swung) {
            return proposed;
        }

        // Closest admissible direction on the polygon boundary.
        let mut best: Option<(f32, Vector3<f32>)> = None;
        for (a, b) in self
            .vertices
            .iter()
            .zip(self.vertices.iter().cycle().skip(1))
        {
            let candidate = closest_on_arc(a, b, &swung);
            let score = candidate.dot(&swung);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, candidate));
            }
        }
        let Some((_, clamped_dir)) = best else {
            return proposed;
        };

        let (_, twist) = math::swing_twist(&proposed, &self.axis);
        let swing = math::shortest_arc(&self.axis, &clamped_dir);
        swing * twist
    }
}

/// Closest point to `dir` on the great-circle arc from `a` to `b`.
fn closest_on_arc(
    a: &Unit<Vector3<f32>>,
    b: &Unit<Vector3<f32>>,
    dir: &Vector3<f32>,
) -> Vector3<f32> {
    let normal = a.cross(&b.into_inner());
    if normal.norm_squared() < math::EPSILON * math::EPSILON {
        return a.into_inner();
    }
    let normal = normal.normalize();
    let projected = dir - normal * dir.dot(&normal);
    if projected.norm_squared() < math::EPSILON * math::EPSILON {
        return a.into_inner();
    }
    let projected = projected.normalize();
    // Inside the arc if it lies between the endpoint planes.
    let within = normal.cross(&a.into_inner()).dot(&projected) >= 0.0
        && projected.cross(&b.into_inner()).dot(&normal) >= 0.0;
    if within {
        projected
    } else if a.dot(dir) >= b.dot(dir) {
        a.into_inner()
    } else {
        b.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn hinge_passes_admissible_rotation_unchanged() {
        let hinge = Constraint::Hinge(Hinge::new(Vector3::z_axis(), -1.0, 1.0));
        let proposed = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.5);
        let result = hinge.constrain_rotation(proposed, UnitQuaternion::identity());
        assert_eq!(result, proposed);
    }

    #[test]
    fn hinge_clamps_angle_to_limits() {
        let hinge = Constraint::Hinge(Hinge::new(Vector3::z_axis(), -0.5, 0.5));
        let proposed = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 2.0);
        let result = hinge.constrain_rotation(proposed, UnitQuaternion::identity());
        assert_relative_eq!(math::twist_angle(&result, &Vector3::z_axis()), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn hinge_removes_off_axis_swing() {
        let hinge = Constraint::Hinge(Hinge::new(Vector3::z_axis(), -1.0, 1.0));
        // Rotation about X has no admissible component beyond its Z twist.
        let proposed = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.8);
        let result = hinge.constrain_rotation(proposed, UnitQuaternion::identity());
        let (swing, _) = math::swing_twist(&result, &Vector3::z_axis());
        assert_relative_eq!(swing.angle(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn ball_socket_passes_small_swing() {
        let ball = Constraint::BallSocket(BallSocket::cone(Vector3::x_axis(), FRAC_PI_2));
        let proposed = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_4);
        let result = ball.constrain_rotation(proposed, UnitQuaternion::identity());
        assert_eq!(result, proposed);
    }

    #[test]
    fn ball_socket_clamps_excess_swing() {
        let ball = BallSocket::cone(Vector3::x_axis(), FRAC_PI_4);
        let proposed = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let result = Constraint::BallSocket(ball.clone())
            .constrain_rotation(proposed, UnitQuaternion::identity());
        let swung = result * Vector3::x();
        assert_relative_eq!(Vector3::x_axis().angle(&swung), FRAC_PI_4, epsilon = 1e-4);
    }

    #[test]
    fn ball_socket_never_overshoots_inward() {
        // Clamping reduces the swing angle, never increases it.
        let ball = BallSocket::new(Vector3::x_axis(), 0.2, 0.4, 0.3, 0.6);
        for angle in [0.1, 0.5, 1.0, 2.0] {
            let proposed = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle);
            let result = Constraint::BallSocket(ball.clone())
                .constrain_rotation(proposed, UnitQuaternion::identity());
            let before = Vector3::x_axis().angle(&(proposed * Vector3::x()));
            let after = Vector3::x_axis().angle(&(result * Vector3::x()));
            assert!(after <= before + 1e-4);
        }
    }

    #[test]
    fn polygon_cone_requires_three_vertices() {
        assert!(PolygonCone::new(Vector3::z_axis(), vec![Vector3::z_axis()]).is_none());
    }

    fn square_cone() -> PolygonCone {
        // Four directions tilted 45 degrees off +Z toward +-X / +-Y.
        let tilt = |v: Vector3<f32>| Unit::new_normalize(v + Vector3::z());
        PolygonCone::new(
            Vector3::z_axis(),
            vec![
                tilt(Vector3::x()),
                tilt(Vector3::y()),
                tilt(-Vector3::x()),
                tilt(-Vector3::y()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn polygon_cone_passes_interior_directions() {
        let cone = Constraint::PolygonCone(square_cone());
        let proposed = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.2);
        let result = cone.constrain_rotation(proposed, UnitQuaternion::identity());
        assert_eq!(result, proposed);
    }

    #[test]
    fn polygon_cone_clamps_exterior_directions() {
        let cone = square_cone();
        let proposed = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 1.4);
        let result =
            Constraint::PolygonCone(cone.clone()).constrain_rotation(proposed, UnitQuaternion::identity());
        let swung = result * Vector3::z();
        assert!(cone.contains(&(swung + Vector3::z() * 1e-4)) || cone.contains(&swung));
        // Clamped direction moved back toward the cone.
        let before = Vector3::z_axis().angle(&(proposed * Vector3::z()));
        let after = Vector3::z_axis().angle(&swung);
        assert!(after < before);
    }

    #[test]
    fn polygon_cone_winding_is_normalized() {
        let tilt = |v: Vector3<f32>| Unit::new_normalize(v + Vector3::z());
        // Clockwise input order; constructor rewinds it.
        let cone = PolygonCone::new(
            Vector3::z_axis(),
            vec![
                tilt(-Vector3::y()),
                tilt(-Vector3::x()),
                tilt(Vector3::y()),
                tilt(Vector3::x()),
            ],
        )
        .unwrap();
        assert!(cone.contains(&Vector3::z()));
    }

    #[test]
    fn fixed_ignores_proposals() {
        let current = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.3);
        let proposed = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.0);
        let result = Constraint::Fixed.constrain_rotation(proposed, current);
        assert_eq!(result, current);
    }

    #[test]
    fn rotational_joints_pin_translation() {
        let hinge = Constraint::Hinge(Hinge::new(Vector3::z_axis(), -1.0, 1.0));
        let current = Vector3::new(1.0, 0.0, 0.0);
        let result = hinge.constrain_translation(Vector3::new(5.0, 5.0, 5.0), current);
        assert_eq!(result, current);
    }
}
