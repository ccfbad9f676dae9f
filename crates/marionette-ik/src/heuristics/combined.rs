//! Combined multi-candidate heuristic.
//!
//! Triangulation proposes up to two rotations per joint (the reflection
//! pair of the law of cosines). For each candidate this heuristic simulates
//! a few CCD refinement passes on a snapshot of the working state, scores
//! the outcome by `error + λ · total rotation applied`, and keeps only the
//! best-scoring state. λ trades smoothness of motion against speed of
//! convergence.

use tracing::trace;

use crate::cache::TransformCache;
use crate::chain::Chain;
use crate::context::Context;

use super::{ccd, triangulation};

/// Multi-candidate heuristic.
#[derive(Debug, Clone)]
pub struct Combined {
    refine_passes: u32,
    rotation_penalty: f32,
}

impl Combined {
    /// Create a combined heuristic from the solver config.
    #[must_use]
    pub fn new(config: &marionette_core::config::SolverConfig) -> Self {
        Self {
            refine_passes: config.refine_passes,
            rotation_penalty: config.rotation_penalty,
        }
    }

    pub fn prepare(&mut self, _ctx: &mut Context) {}

    pub fn apply(&mut self, ctx: &mut Context, joint: usize) {
        let candidates = triangulation::candidates(ctx, joint);
        if candidates.iter().all(Option::is_none) {
            ccd::align_step(ctx, joint);
            return;
        }

        let start = ctx.snapshot();
        let mut best: Option<(f32, (Chain, TransformCache))> = None;

        for candidate in candidates.into_iter().flatten() {
            let mut spent = 0.0;
            let delta = ctx.ramped(&candidate);
            let affected = ctx.downstream_of(joint);
            spent += ctx.rotate_joint(joint, delta, &affected).angle();

            // Refinement sweeps over the sub-chain the candidate touched.
            for _ in 0..self.refine_passes {
                for refine_joint in (joint..ctx.effector()).rev() {
                    spent += ccd::align_step(ctx, refine_joint);
                }
            }

            let score = ctx.working_error() + self.rotation_penalty * spent;
            if best.as_ref().map_or(true, |(s, _)| score < *s) {
                best = Some((score, ctx.snapshot()));
            }
            ctx.restore(start.clone());
        }

        if let Some((score, state)) = best {
            trace!(joint, score, "combined candidate committed");
            ctx.restore(state);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
