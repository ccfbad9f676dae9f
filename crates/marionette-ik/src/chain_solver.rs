//! Iterative solver for a single kinematic chain.
//!
//! Each iteration runs the configured heuristic over every joint of the
//! working copy, then commits the result into the authoritative chain only
//! if it beats the best error seen since the last reset. The authoritative
//! chain therefore never gets worse across `solve()` calls, no matter what
//! the heuristic does; even the randomized deadlock escapes only ever
//! perturb the working copy.

use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use marionette_core::config::SolverConfig;
use marionette_core::error::{ChainError, MarionetteError};
use marionette_core::seed::seeded_rng;
use marionette_core::skeleton::Skeleton;
use marionette_core::types::Pose;

use crate::chain::Chain;
use crate::context::Context;
use crate::heuristics::{Heuristic, HeuristicKind};

/// Lifecycle of a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverState {
    /// Constructed, nothing prepared yet.
    #[default]
    Idle,
    /// Reset and ready to iterate.
    Prepared,
    /// At least one iteration has run since the last reset.
    Iterating,
    /// Error dropped to `max_error` or below.
    Converged,
    /// Iteration budget exhausted without converging.
    Exhausted,
}

/// Heuristic IK solver for one chain.
#[derive(Debug, Clone)]
pub struct ChainSolver {
    ctx: Context,
    heuristic: Heuristic,
    config: SolverConfig,
    state: SolverState,
    /// Commit gate: best working error since the last reset. Monotone.
    best_error: f32,
    /// Stagnation reference, re-anchored after every escape.
    anchor_error: f32,
    iterations: u32,
    last_iterations: u32,
    budget: f32,
    stagnant: u32,
    deadlocks: u32,
    rng: ChaCha8Rng,
    flip: bool,
    last_target: Option<Pose>,
}

impl ChainSolver {
    /// Create a solver for `chain` using the selected heuristic.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config or an empty chain.
    pub fn new(
        chain: Chain,
        heuristic: &HeuristicKind,
        config: SolverConfig,
    ) -> Result<Self, MarionetteError> {
        config.validate()?;
        let ctx = Context::new(chain, &config)?;
        let rng = seeded_rng(config.seed);
        Ok(Self {
            heuristic: Heuristic::from_kind(heuristic, &config),
            ctx,
            config,
            state: SolverState::Idle,
            best_error: f32::INFINITY,
            anchor_error: f32::INFINITY,
            iterations: 0,
            last_iterations: 0,
            budget: 0.0,
            stagnant: 0,
            deadlocks: 0,
            rng,
            flip: false,
            last_target: None,
        })
    }

    // -- configuration --------------------------------------------------------

    /// Set the target pose for the effector.
    pub fn set_target(&mut self, target: Pose) {
        self.ctx.set_target(target);
    }

    /// Re-target the chain at a different link.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::EffectorOutOfRange`] for an unknown index.
    pub fn set_effector(&mut self, index: usize) -> Result<(), ChainError> {
        self.ctx.set_effector(index)
    }

    /// Update the convergence threshold.
    pub fn set_max_error(&mut self, max_error: f32) {
        self.config.max_error = max_error;
    }

    /// Update the iteration cap.
    pub fn set_max_iterations(&mut self, max_iterations: u32) {
        self.config.max_iterations = max_iterations;
    }

    /// Update the fractional per-call iteration budget.
    pub fn set_times_per_frame(&mut self, times_per_frame: f32) {
        self.config.times_per_frame = times_per_frame;
    }

    /// Update the degeneracy threshold.
    pub fn set_min_distance(&mut self, min_distance: f32) {
        self.config.min_distance = min_distance;
        self.ctx.set_min_distance(min_distance);
    }

    // -- inspection -----------------------------------------------------------

    /// Current solver state.
    #[must_use]
    pub const fn state(&self) -> SolverState {
        self.state
    }

    /// Error of the authoritative chain against the current target.
    #[must_use]
    pub fn error(&self) -> f32 {
        self.ctx.authoritative_error()
    }

    /// Iterations run by the most recent `solve()` call.
    #[must_use]
    pub const fn last_iteration_count(&self) -> u32 {
        self.last_iterations
    }

    /// Total iterations since the last reset.
    #[must_use]
    pub const fn iteration_count(&self) -> u32 {
        self.iterations
    }

    /// Deadlock escapes attempted since the last reset (diagnostic).
    #[must_use]
    pub const fn deadlock_count(&self) -> u32 {
        self.deadlocks
    }

    /// The authoritative chain.
    #[must_use]
    pub const fn chain(&self) -> &Chain {
        self.ctx.chain()
    }

    /// The solver's context, including the speculative working copy.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.ctx
    }

    /// Copy the authoritative chain back onto skeleton bones.
    ///
    /// # Errors
    ///
    /// Fails if `bones` does not match the chain.
    pub fn write_back(&self, skeleton: &mut Skeleton, bones: &[usize]) -> Result<(), ChainError> {
        self.ctx.chain().write_back(skeleton, bones)
    }

    /// Replace the chain (e.g. after its skeleton segment moved) and reset.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Empty`] for an empty chain.
    pub fn load_chain(&mut self, chain: Chain) -> Result<(), ChainError> {
        self.ctx.install_chain(chain)?;
        self.after_reset();
        Ok(())
    }

    // -- lifecycle ------------------------------------------------------------

    /// Resynchronize the working copy from the authoritative chain and
    /// restart the iteration budget and error trackers.
    pub fn reset(&mut self) {
        self.ctx.reset();
        self.after_reset();
    }

    fn after_reset(&mut self) {
        self.best_error = self.ctx.working_error();
        self.anchor_error = self.best_error;
        self.iterations = 0;
        self.last_iterations = 0;
        self.budget = 0.0;
        self.stagnant = 0;
        self.deadlocks = 0;
        self.flip = false;
        self.state = SolverState::Prepared;
    }

    /// Advance the solve by this call's share of iterations.
    ///
    /// A changed target forces a reset first. Iterations run until the
    /// fractional times-per-frame budget is exhausted, the error reaches
    /// `max_error`, or the iteration cap is hit.
    pub fn solve(&mut self) {
        let target_changed = self
            .last_target
            .map_or(true, |previous| previous != *self.ctx.target());
        if target_changed || self.state == SolverState::Idle {
            self.reset();
            self.last_target = Some(*self.ctx.target());
        }
        self.last_iterations = 0;

        if self.best_error <= self.config.max_error {
            self.state = SolverState::Converged;
            return;
        }
        if matches!(self.state, SolverState::Converged | SolverState::Exhausted) {
            return;
        }

        self.budget += self.config.times_per_frame;
        while self.budget >= 1.0 {
            self.budget -= 1.0;
            self.iterate();
            self.last_iterations += 1;

            if self.best_error <= self.config.max_error {
                self.state = SolverState::Converged;
                break;
            }
            if self.iterations >= self.config.max_iterations {
                self.state = SolverState::Exhausted;
                break;
            }
        }
    }

    /// One full iteration: prepare, sweep every joint, evaluate, maybe
    /// commit, detect stagnation.
    fn iterate(&mut self) {
        self.state = SolverState::Iterating;
        self.ctx.set_iteration(self.iterations, self.config.max_iterations);
        if self.config.rebuild_cache_each_iteration {
            self.ctx.rebuild_cache();
        }

        self.heuristic.prepare(&mut self.ctx);
        let flip = self.flip;
        if self.config.alternate_direction {
            self.flip = !self.flip;
        }
        for joint in self.ctx.joint_order(flip) {
            self.heuristic.apply(&mut self.ctx, joint);
        }

        let error = self.ctx.working_error();
        if error < self.best_error {
            self.ctx.commit();
            self.best_error = error;
            trace!(iteration = self.iterations, error, "committed improvement");
        }

        // Stagnation: no significant improvement on the anchor for too long.
        if self.anchor_error - error > 0.1 * self.config.max_error {
            self.anchor_error = error;
            self.stagnant = 0;
        } else {
            self.anchor_error = self.anchor_error.min(error);
            self.stagnant += 1;
            if self.stagnant >= self.config.lock_criteria {
                self.escape_deadlock();
            }
        }

        self.iterations += 1;
    }

    /// Randomized escape from a local minimum: one constrained rotation per
    /// joint on the working copy, then re-anchor the stagnation tracker.
    /// The authoritative chain is untouched; a perturbed configuration only
    /// commits if it eventually beats the best error outright.
    fn escape_deadlock(&mut self) {
        self.deadlocks += 1;
        self.stagnant = 0;
        self.ctx.perturb(&mut self.rng, self.config.max_perturbation);
        self.anchor_error = self.ctx.working_error();
        debug!(
            deadlocks = self.deadlocks,
            iteration = self.iterations,
            "stagnation detected, perturbing working copy"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marionette_core::constraint::{Constraint, Hinge};
    use nalgebra::{UnitQuaternion, Vector3};

    use crate::chain::Joint;

    fn straight_chain(n: usize) -> Chain {
        let joints = (0..n)
            .map(|i| {
                let offset = if i == 0 {
                    Vector3::zeros()
                } else {
                    Vector3::new(1.0, 0.0, 0.0)
                };
                Joint::new(format!("j{i}"), offset, UnitQuaternion::identity())
            })
            .collect();
        Chain::new(joints, Pose::identity()).unwrap()
    }

    fn solver(n: usize, heuristic: HeuristicKind, config: SolverConfig) -> ChainSolver {
        ChainSolver::new(straight_chain(n), &heuristic, config).unwrap()
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = SolverConfig {
            max_error: -1.0,
            ..SolverConfig::default()
        };
        assert!(matches!(
            ChainSolver::new(straight_chain(3), &HeuristicKind::Ccd, config),
            Err(MarionetteError::Config(_))
        ));
    }

    #[test]
    fn solve_converges_on_a_reachable_target() {
        let config = SolverConfig {
            times_per_frame: 100.0,
            ..SolverConfig::default()
        };
        let mut solver = solver(4, HeuristicKind::Ccd, config);
        solver.set_target(Pose::from_position(Vector3::new(1.5, 1.5, 0.0)));
        solver.solve();
        assert_eq!(solver.state(), SolverState::Converged);
        assert!(solver.error() <= 0.01);
        assert!(solver.last_iteration_count() > 0);
    }

    #[test]
    fn solve_reports_exhaustion_on_unreachable_targets() {
        let config = SolverConfig {
            max_iterations: 20,
            times_per_frame: 30.0,
            ..SolverConfig::default()
        };
        let mut solver = solver(3, HeuristicKind::Ccd, config);
        solver.set_target(Pose::from_position(Vector3::new(10.0, 0.0, 0.0)));
        solver.solve();
        assert_eq!(solver.state(), SolverState::Exhausted);
        assert!(solver.error() > 1.0);
        assert_eq!(solver.iteration_count(), 20);
    }

    #[test]
    fn fractional_budget_spreads_iterations_over_calls() {
        let config = SolverConfig {
            times_per_frame: 0.5,
            ..SolverConfig::default()
        };
        let mut solver = solver(4, HeuristicKind::Ccd, config);
        solver.set_target(Pose::from_position(Vector3::new(0.0, 2.0, 0.0)));
        solver.solve();
        let first = solver.last_iteration_count();
        solver.solve();
        let second = solver.last_iteration_count();
        // Half an iteration per call: one call in two actually iterates.
        assert_eq!(first + second, 1);
    }

    #[test]
    fn target_change_forces_a_reset() {
        let mut solver = solver(4, HeuristicKind::Ccd, SolverConfig::default());
        solver.set_target(Pose::from_position(Vector3::new(0.0, 2.0, 0.0)));
        solver.solve();
        let after_first = solver.iteration_count();
        assert!(after_first > 0);

        solver.set_target(Pose::from_position(Vector3::new(2.0, 0.5, 0.0)));
        solver.solve();
        // Iterations restarted from zero for the new target.
        assert_eq!(solver.iteration_count(), solver.last_iteration_count());
    }

    #[test]
    fn error_never_regresses_across_calls() {
        let config = SolverConfig {
            times_per_frame: 3.0,
            ..SolverConfig::default()
        };
        let mut solver = solver(5, HeuristicKind::Ccd, config);
        solver.set_target(Pose::from_position(Vector3::new(1.0, 2.5, 0.5)));

        let mut previous = f32::INFINITY;
        for _ in 0..30 {
            solver.solve();
            let error = solver.error();
            assert!(error <= previous + 1e-6, "error regressed: {error} > {previous}");
            previous = error;
        }
    }

    #[test]
    fn deadlocked_chain_perturbs_and_counts() {
        // Hinges locked to (almost) no travel, target far off-axis:
        // nothing improves, stagnation must trip the escape.
        let mut chain = straight_chain(4);
        for i in 0..4 {
            chain.joint_mut(i).constraint = Some(Constraint::Hinge(Hinge::new(
                Vector3::z_axis(),
                -1e-4,
                1e-4,
            )));
        }
        let config = SolverConfig {
            max_iterations: 40,
            times_per_frame: 40.0,
            lock_criteria: 5,
            ..SolverConfig::default()
        };
        let mut solver = ChainSolver::new(chain, &HeuristicKind::Ccd, config).unwrap();
        solver.set_target(Pose::from_position(Vector3::new(0.0, 0.0, 2.0)));
        solver.solve();

        assert!(solver.deadlock_count() >= 1);
        assert_eq!(solver.state(), SolverState::Exhausted);
    }

    #[test]
    fn solved_target_converges_without_iterating() {
        let mut solver = solver(3, HeuristicKind::Ccd, SolverConfig::default());
        // The default target is the chain's own effector pose.
        let tip = solver
            .chain()
            .joints()
            .iter()
            .fold(Vector3::zeros(), |acc, j| acc + j.translation);
        solver.set_target(Pose::from_position(tip));
        solver.solve();
        assert_eq!(solver.state(), SolverState::Converged);
        assert_relative_eq!(solver.error(), 0.0, epsilon = 1e-5);
        assert_eq!(solver.last_iteration_count(), 0);
    }

    #[test]
    fn triangulation_and_trik_also_converge() {
        for heuristic in [
            HeuristicKind::Triangulation,
            HeuristicKind::ReachAndFix,
            HeuristicKind::Combined,
            HeuristicKind::BackAndForth(Box::new(HeuristicKind::ReachAndFix)),
        ] {
            let config = SolverConfig {
                times_per_frame: 100.0,
                ..SolverConfig::default()
            };
            let mut solver = solver(4, heuristic.clone(), config);
            solver.set_target(Pose::from_position(Vector3::new(1.2, 1.8, 0.3)));
            solver.solve();
            assert!(
                solver.error() <= 0.01,
                "{heuristic:?} failed to converge: {}",
                solver.error()
            );
        }
    }
}
