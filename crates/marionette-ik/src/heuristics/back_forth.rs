//! Back-and-forth wrapper.
//!
//! Runs any main heuristic at `(i, i + 1)`, then a few alternating CCD
//! alignment passes between `i + 1` and `i` to cancel the residual error a
//! main step's downstream-rigidity assumption leaves behind.

use crate::context::Context;

use super::{ccd, Heuristic};

/// Wrapper adding alternating CCD repair passes after a main step.
#[derive(Debug, Clone)]
pub struct BackAndForth {
    main: Box<Heuristic>,
    passes: u32,
}

impl BackAndForth {
    /// Wrap `main`, following every application with `passes` alternating
    /// CCD alignments.
    #[must_use]
    pub fn new(main: Box<Heuristic>, passes: u32) -> Self {
        Self { main, passes }
    }

    pub fn prepare(&mut self, ctx: &mut Context) {
        self.main.prepare(ctx);
    }

    pub fn apply(&mut self, ctx: &mut Context, joint: usize) {
        self.main.apply(ctx, joint);

        let next = (joint + 1).min(ctx.effector());
        for pass in 0..self.passes {
            let repair_joint = if pass % 2 == 0 { next } else { joint };
            ccd::align_step(ctx, repair_joint);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
