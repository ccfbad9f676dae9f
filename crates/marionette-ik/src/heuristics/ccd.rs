//! Cyclic coordinate descent.
//!
//! Each joint gets one rotation aligning the joint→effector direction with
//! the joint→target direction. Hinge joints align within their rotation
//! plane. An optional second pass nudges joints toward the target
//! orientation, later joints taking a larger share.

use marionette_core::math;

use crate::context::Context;

/// CCD heuristic.
#[derive(Debug, Clone)]
pub struct Ccd {
    orientation_pass: bool,
}

impl Ccd {
    /// Create a CCD heuristic; the orientation pass runs when the config
    /// weights orientation error at all.
    #[must_use]
    pub fn new(config: &marionette_core::config::SolverConfig) -> Self {
        Self {
            orientation_pass: config.orientation_weight > 0.0,
        }
    }

    /// Positional pass only, regardless of config.
    #[must_use]
    pub const fn positional() -> Self {
        Self {
            orientation_pass: false,
        }
    }

    pub fn prepare(&mut self, _ctx: &mut Context) {}

    pub fn apply(&mut self, ctx: &mut Context, joint: usize) {
        align_step(ctx, joint);
        if self.orientation_pass {
            orient_step(ctx, joint);
        }
    }
}

/// One CCD alignment at `joint`: rotate so the effector direction points at
/// the target. Returns the rotation angle actually applied.
pub(crate) fn align_step(ctx: &mut Context, joint: usize) -> f32 {
    let effector = ctx.effector();
    let joint_position = ctx.world_position(joint);
    let mut to_effector = ctx.world_position(effector) - joint_position;
    let mut to_target = ctx.target().position - joint_position;

    let min_distance = ctx.min_distance();
    if to_effector.norm() < min_distance || to_target.norm() < min_distance {
        return 0.0;
    }

    // A hinge can only rotate in its plane; align the projections.
    if let Some(axis) = ctx
        .working()
        .joint(joint)
        .constraint
        .as_ref()
        .and_then(|c| c.hinge_axis())
        .copied()
    {
        let world_axis = nalgebra::Unit::new_normalize(ctx.parent_orientation(joint) * axis.into_inner());
        to_effector = math::project_onto_plane(&to_effector, &world_axis);
        to_target = math::project_onto_plane(&to_target, &world_axis);
        if to_effector.norm() < min_distance || to_target.norm() < min_distance {
            return 0.0;
        }
    }

    let delta = ctx.ramped(&math::shortest_arc(&to_effector, &to_target));
    let affected = ctx.downstream_of(joint);
    ctx.rotate_joint(joint, delta, &affected).angle()
}

/// Nudge `joint` toward the target orientation. The share grows with the
/// joint's position along the chain so joints close to the effector do most
/// of the orienting.
pub(crate) fn orient_step(ctx: &mut Context, joint: usize) {
    let effector = ctx.effector();
    let error = ctx.target().orientation * ctx.world_orientation(effector).inverse();
    if error.angle() < math::EPSILON {
        return;
    }
    let share = (joint + 1) as f32 / (effector + 1) as f32;
    let delta = ctx.ramped(&math::scale_rotation(&error, share));
    let affected = ctx.downstream_of(joint);
    ctx.rotate_joint(joint, delta, &affected);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marionette_core::config::SolverConfig;
    use marionette_core::constraint::{Constraint, Hinge};
    use marionette_core::types::Pose;
    use nalgebra::{UnitQuaternion, Vector3};

    use crate::chain::{Chain, Joint};

    fn unramped_config() -> SolverConfig {
        SolverConfig {
            ramp_enabled: false,
            ..SolverConfig::default()
        }
    }

    fn two_bone_context(config: &SolverConfig) -> Context {
        let joints = vec![
            Joint::new("base", Vector3::zeros(), UnitQuaternion::identity()),
            Joint::new("mid", Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity()),
            Joint::new("tip", Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity()),
        ];
        Context::new(Chain::new(joints, Pose::identity()).unwrap(), config).unwrap()
    }

    #[test]
    fn align_step_points_the_effector_at_the_target() {
        let config = unramped_config();
        let mut ctx = two_bone_context(&config);
        ctx.set_target(Pose::from_position(Vector3::new(0.0, 2.0, 0.0)));

        let angle = align_step(&mut ctx, 0);
        assert_relative_eq!(angle, std::f32::consts::FRAC_PI_2, epsilon = 1e-4);
        assert_relative_eq!(
            ctx.world_position(2),
            Vector3::new(0.0, 2.0, 0.0),
            epsilon = 1e-4
        );
    }

    #[test]
    fn align_step_skips_degenerate_targets() {
        let config = unramped_config();
        let mut ctx = two_bone_context(&config);
        // Target sits exactly on the joint: no direction to align with.
        ctx.set_target(Pose::from_position(Vector3::zeros()));
        let angle = align_step(&mut ctx, 0);
        assert_relative_eq!(angle, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn hinge_joint_aligns_within_its_plane() {
        let config = unramped_config();
        let mut ctx = {
            let joints = vec![
                Joint::new("base", Vector3::zeros(), UnitQuaternion::identity()).with_constraint(
                    Constraint::Hinge(Hinge::new(Vector3::z_axis(), -3.0, 3.0)),
                ),
                Joint::new("tip", Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity()),
            ];
            Context::new(Chain::new(joints, Pose::identity()).unwrap(), &config).unwrap()
        };
        // Out-of-plane target: only its XY component is reachable.
        ctx.set_target(Pose::from_position(Vector3::new(0.0, 1.0, 5.0)));
        align_step(&mut ctx, 0);
        let tip = ctx.world_position(1);
        assert_relative_eq!(tip.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(tip.y, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn orient_step_turns_the_effector_toward_the_target_orientation() {
        let config = SolverConfig {
            orientation_weight: 1.0,
            ramp_enabled: false,
            ..SolverConfig::default()
        };
        let mut ctx = two_bone_context(&config);
        let target_orientation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.9);
        ctx.set_target(Pose::new(Vector3::new(2.0, 0.0, 0.0), target_orientation));

        let before = ctx.world_orientation(2).angle_to(&target_orientation);
        orient_step(&mut ctx, 2);
        let after = ctx.world_orientation(2).angle_to(&target_orientation);
        assert!(after < before);
        // The effector joint takes the full share.
        assert_relative_eq!(after, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn full_sweep_converges_on_a_reachable_target() {
        let config = unramped_config();
        let mut ctx = two_bone_context(&config);
        ctx.set_target(Pose::from_position(Vector3::new(1.0, 1.0, 0.0)));
        let mut ccd = Ccd::positional();
        for _ in 0..30 {
            for joint in ctx.joint_order(false) {
                ccd.apply(&mut ctx, joint);
            }
        }
        assert!(ctx.working_error() < 1e-3);
    }
}
