//! Triangulation (law-of-cosines) heuristic.
//!
//! Joint `i`, joint `i + 1`, the effector and the target form a triangle
//! with sides `a = |i → i+1|`, `b = |i+1 → effector|`, `c = |i → target|`.
//! When the triangle inequality fails the chain fully extends or fully
//! contracts; otherwise the angle at joint `i` follows from the half-angle
//! law of cosines, which stays well-conditioned where the naive
//! `acos` form loses digits.

use nalgebra::UnitQuaternion;

use marionette_core::math;

use crate::context::Context;

use super::ccd;

/// Triangulation heuristic.
#[derive(Debug, Clone, Default)]
pub struct Triangulation;

impl Triangulation {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    pub fn prepare(&mut self, _ctx: &mut Context) {}

    pub fn apply(&mut self, ctx: &mut Context, joint: usize) {
        let [first, _] = candidates(ctx, joint);
        match first {
            Some(delta) => {
                let delta = ctx.ramped(&delta);
                let affected = ctx.downstream_of(joint);
                ctx.rotate_joint(joint, delta, &affected);
            }
            // The effector itself has no next joint to triangulate with.
            None => {
                ccd::align_step(ctx, joint);
            }
        }
    }
}

/// Candidate rotations at `joint`, unramped.
///
/// The extend and contract branches admit a single solution; the interior
/// case yields the two angular solutions of the law of cosines (the
/// reflection pair on either side of the joint→target line). Degenerate
/// geometry yields no candidates.
pub(crate) fn candidates(ctx: &Context, joint: usize) -> [Option<UnitQuaternion<f32>>; 2] {
    let effector = ctx.effector();
    if joint >= effector {
        return [None, None];
    }
    let next = joint + 1;

    let joint_position = ctx.world_position(joint);
    let side_a = ctx.world_position(next) - joint_position;
    let side_c = ctx.target().position - joint_position;
    let a = side_a.norm();
    let b = (ctx.world_position(effector) - ctx.world_position(next)).norm();
    let c = side_c.norm();

    let min_distance = ctx.min_distance();
    if a < min_distance || c < min_distance {
        return [None, None];
    }

    if a + b <= c {
        // Out of reach: straighten toward the target.
        return [Some(math::shortest_arc(&side_a, &side_c)), None];
    }
    if c < (a - b).abs() {
        // Target inside the annulus: fold away from it.
        return [Some(math::shortest_arc(&side_a, &(-side_c))), None];
    }

    // Interior angle at the joint, via tan(γ/2) = √((s−a)(s−c) / (s(s−b))).
    // The extend/contract branches above keep both radicands positive.
    let s = 0.5 * (a + b + c);
    let gamma = 2.0 * ((s - a) * (s - c) / (s * (s - b))).max(0.0).sqrt().atan();

    let theta = side_a.angle(&side_c);
    let normal = side_a.cross(&side_c);
    let normal = if normal.norm() < min_distance {
        math::perpendicular(&side_a)
    } else {
        nalgebra::Unit::new_normalize(normal)
    };

    [
        Some(UnitQuaternion::from_axis_angle(&normal, theta - gamma)),
        Some(UnitQuaternion::from_axis_angle(&normal, theta + gamma)),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
