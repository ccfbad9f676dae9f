//! Reach-and-fix (TRIK) heuristic.
//!
//! A two-step local solve on the joint pair `(i, i + 1)`: first rotate `i`
//! as if everything downstream were rigid, carrying the effector toward the
//! target; then counter-rotate `i + 1` to restore the orientation the
//! downstream links had before the reach step, preserving the effector's
//! orientation contribution. The repair disturbs downstream positions
//! slightly (the cost of being cheaper than a full triangulation), so the
//! back-and-forth wrapper exists to cancel the residue.

use crate::context::Context;

use super::ccd;

/// TRIK heuristic.
#[derive(Debug, Clone, Default)]
pub struct ReachAndFix;

impl ReachAndFix {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    pub fn prepare(&mut self, _ctx: &mut Context) {}

    pub fn apply(&mut self, ctx: &mut Context, joint: usize) {
        let effector = ctx.effector();
        if joint >= effector {
            ccd::align_step(ctx, joint);
            return;
        }
        let next = joint + 1;
        let previous_orientation = ctx.world_orientation(next);

        // Reach: point the rigid downstream at the target.
        ccd::align_step(ctx, joint);

        // Fix: give the downstream links their pre-reach orientation back.
        let repair = previous_orientation * ctx.world_orientation(next).inverse();
        let affected = ctx.downstream_of(next);
        ctx.rotate_joint(next, repair, &affected);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
