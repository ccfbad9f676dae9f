//! Pluggable per-joint update heuristics.
//!
//! Every heuristic implements the same two-phase contract: `prepare` runs
//! once per iteration, `apply` once per joint in the iteration's traversal
//! order. Heuristics hold no long-lived state beyond scratch buffers; all
//! chain state lives in the [`Context`] they are handed.

mod back_forth;
mod ccd;
mod combined;
mod reach_fix;
mod triangulation;

pub use back_forth::BackAndForth;
pub use ccd::Ccd;
pub use combined::Combined;
pub use reach_fix::ReachAndFix;
pub use triangulation::Triangulation;

use marionette_core::config::SolverConfig;

use crate::context::Context;

/// Caller-facing heuristic selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeuristicKind {
    /// Cyclic coordinate descent: one alignment rotation per joint.
    Ccd,
    /// Law-of-cosines two-joint solve.
    Triangulation,
    /// Two-joint reach step plus orientation repair (TRIK).
    ReachAndFix,
    /// Multi-candidate triangulation with simulated CCD refinement.
    Combined,
    /// Any main step followed by alternating CCD repair passes.
    BackAndForth(Box<HeuristicKind>),
}

/// A single-step joint-update algorithm.
#[derive(Debug, Clone)]
pub enum Heuristic {
    Ccd(Ccd),
    Triangulation(Triangulation),
    ReachAndFix(ReachAndFix),
    Combined(Combined),
    BackAndForth(BackAndForth),
}

impl Heuristic {
    /// Instantiate a heuristic from its selector and the solver config.
    #[must_use]
    pub fn from_kind(kind: &HeuristicKind, config: &SolverConfig) -> Self {
        match kind {
            HeuristicKind::Ccd => Self::Ccd(Ccd::new(config)),
            HeuristicKind::Triangulation => Self::Triangulation(Triangulation::new()),
            HeuristicKind::ReachAndFix => Self::ReachAndFix(ReachAndFix::new()),
            HeuristicKind::Combined => Self::Combined(Combined::new(config)),
            HeuristicKind::BackAndForth(main) => Self::BackAndForth(BackAndForth::new(
                Box::new(Self::from_kind(main, config)),
                config.back_forth_passes,
            )),
        }
    }

    /// Run once before a sweep over the joints.
    pub fn prepare(&mut self, ctx: &mut Context) {
        match self {
            Self::Ccd(h) => h.prepare(ctx),
            Self::Triangulation(h) => h.prepare(ctx),
            Self::ReachAndFix(h) => h.prepare(ctx),
            Self::Combined(h) => h.prepare(ctx),
            Self::BackAndForth(h) => h.prepare(ctx),
        }
    }

    /// Update the chain at one joint.
    pub fn apply(&mut self, ctx: &mut Context, joint: usize) {
        match self {
            Self::Ccd(h) => h.apply(ctx, joint),
            Self::Triangulation(h) => h.apply(ctx, joint),
            Self::ReachAndFix(h) => h.apply(ctx, joint),
            Self::Combined(h) => h.apply(ctx, joint),
            Self::BackAndForth(h) => h.apply(ctx, joint),
        }
    }
}
