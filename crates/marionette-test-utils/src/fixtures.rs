//! Canned skeletons for solver tests.

use nalgebra::{UnitQuaternion, Vector3};

use marionette_core::constraint::{Constraint, Hinge};
use marionette_core::skeleton::Skeleton;

/// A straight chain of `bones` unit-length bones along `+X`, rooted at the
/// origin. Returns the skeleton and the tip bone index.
///
/// The root bone sits at the origin with a zero offset, so a skeleton with
/// `bones` bones has a reach of `bones - 1`.
#[must_use]
pub fn straight_skeleton(bones: usize) -> (Skeleton, usize) {
    assert!(bones >= 1, "a chain needs at least one bone");
    let mut skel = Skeleton::new();
    let mut last = skel.add_root("bone0", Vector3::zeros(), UnitQuaternion::identity());
    for i in 1..bones {
        last = skel
            .add_bone(
                format!("bone{i}"),
                last,
                Vector3::new(1.0, 0.0, 0.0),
                UnitQuaternion::identity(),
            )
            .expect("parent exists");
    }
    (skel, last)
}

/// Like [`straight_skeleton`], but every joint is a Z-axis hinge limited to
/// `[min_angle, max_angle]`.
#[must_use]
pub fn hinged_skeleton(bones: usize, min_angle: f32, max_angle: f32) -> (Skeleton, usize) {
    let (mut skel, tip) = straight_skeleton(bones);
    for index in 0..skel.len() {
        skel.set_constraint(
            index,
            Constraint::Hinge(Hinge::new(Vector3::z_axis(), min_angle, max_angle)),
        )
        .expect("bone exists");
    }
    (skel, tip)
}

/// Y-shaped skeleton: a two-bone trunk along `+Y` splitting into two
/// two-bone arms along `-X` and `+X`. Returns the skeleton and the two arm
/// tip indices `(left, right)`.
#[must_use]
pub fn y_skeleton() -> (Skeleton, usize, usize) {
    let mut skel = Skeleton::new();
    let root = skel.add_root("root", Vector3::zeros(), UnitQuaternion::identity());
    let trunk = skel
        .add_bone("trunk", root, Vector3::new(0.0, 1.0, 0.0), UnitQuaternion::identity())
        .expect("parent exists");
    let left_a = skel
        .add_bone("left_a", trunk, Vector3::new(-1.0, 0.0, 0.0), UnitQuaternion::identity())
        .expect("parent exists");
    let left_tip = skel
        .add_bone("left_tip", left_a, Vector3::new(-1.0, 0.0, 0.0), UnitQuaternion::identity())
        .expect("parent exists");
    let right_a = skel
        .add_bone("right_a", trunk, Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity())
        .expect("parent exists");
    let right_tip = skel
        .add_bone("right_tip", right_a, Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity())
        .expect("parent exists");
    (skel, left_tip, right_tip)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
