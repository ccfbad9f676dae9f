//! Per-chain solver state shared by every heuristic.
//!
//! A [`Context`] owns two copies of one kinematic chain: the
//! *authoritative* chain (the best configuration committed so far) and the
//! *working* chain the heuristics speculate on, each paired with its own
//! [`TransformCache`]. During an iteration only the working copy moves; the
//! authoritative chain changes exclusively through [`Context::commit`],
//! which is what makes the solver's never-regress guarantee cheap to
//! uphold.

use nalgebra::{UnitQuaternion, Vector3};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use marionette_core::config::{SolverConfig, TraversalDirection};
use marionette_core::error::ChainError;
use marionette_core::math;
use marionette_core::types::Pose;

use crate::cache::TransformCache;
use crate::chain::Chain;

/// Shared state for one chain solve.
#[derive(Debug, Clone)]
pub struct Context {
    chain: Chain,
    working: Chain,
    cache: TransformCache,
    authoritative_cache: TransformCache,
    target: Pose,
    effector: usize,
    direction: TraversalDirection,
    min_distance: f32,
    search_radius: f32,
    orientation_weight: f32,
    ramp_enabled: bool,
    ramp_start: f32,
    ramp_end: f32,
    /// Fraction of each proposed rotation allowed this iteration.
    ramp_fraction: f32,
}

impl Context {
    /// Create a context for `chain`. The effector starts at the last joint
    /// and the target at the chain's current effector pose (a solved
    /// no-op until a real target is set).
    pub fn new(chain: Chain, config: &SolverConfig) -> Result<Self, ChainError> {
        if chain.is_empty() {
            return Err(ChainError::Empty);
        }
        let effector = chain.len() - 1;
        let working = chain.clone();
        let mut cache = TransformCache::new(chain.len());
        cache.rebuild(&working);
        let authoritative_cache = cache.clone();
        let target = Pose::new(
            cache.entry(effector).position,
            cache.entry(effector).orientation,
        );
        Ok(Self {
            chain,
            working,
            cache,
            authoritative_cache,
            target,
            effector,
            direction: config.direction,
            min_distance: config.min_distance,
            search_radius: config.search_radius,
            orientation_weight: config.orientation_weight,
            ramp_enabled: config.ramp_enabled,
            ramp_start: config.ramp_start,
            ramp_end: config.ramp_end,
            ramp_fraction: if config.ramp_enabled {
                config.ramp_start
            } else {
                1.0
            },
        })
    }

    // -- chain access --------------------------------------------------------

    /// Number of joints.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether the chain is empty (never true after construction).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// The authoritative chain: best configuration committed so far.
    #[must_use]
    pub const fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The speculative working chain.
    #[must_use]
    pub const fn working(&self) -> &Chain {
        &self.working
    }

    /// Replace the authoritative chain (used when a segment is resynced
    /// from its skeleton) and resynchronize the working copy.
    pub fn install_chain(&mut self, chain: Chain) -> Result<(), ChainError> {
        if chain.is_empty() {
            return Err(ChainError::Empty);
        }
        if chain.len() != self.chain.len() {
            self.cache = TransformCache::new(chain.len());
            self.authoritative_cache = TransformCache::new(chain.len());
            self.effector = self.effector.min(chain.len() - 1);
        }
        self.chain = chain;
        self.reset();
        Ok(())
    }

    // -- target and effector -------------------------------------------------

    /// The target pose.
    #[must_use]
    pub const fn target(&self) -> &Pose {
        &self.target
    }

    /// Set the target pose.
    pub fn set_target(&mut self, target: Pose) {
        self.target = target;
    }

    /// Index of the end-effector joint.
    #[must_use]
    pub const fn effector(&self) -> usize {
        self.effector
    }

    /// Re-target the chain at a different link.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::EffectorOutOfRange`] for an unknown index.
    pub fn set_effector(&mut self, index: usize) -> Result<(), ChainError> {
        if index >= self.chain.len() {
            return Err(ChainError::EffectorOutOfRange {
                index,
                len: self.chain.len(),
            });
        }
        self.effector = index;
        Ok(())
    }

    // -- world transforms (working copy) -------------------------------------

    /// World position of a working-copy joint.
    #[must_use]
    pub fn world_position(&self, index: usize) -> Vector3<f32> {
        self.cache.entry(index).position
    }

    /// World orientation of a working-copy joint.
    #[must_use]
    pub fn world_orientation(&self, index: usize) -> UnitQuaternion<f32> {
        self.cache.entry(index).orientation
    }

    /// World orientation of the frame joint `index` is expressed in.
    #[must_use]
    pub fn parent_orientation(&self, index: usize) -> UnitQuaternion<f32> {
        if index == 0 {
            self.working.base().orientation
        } else {
            self.cache.entry(index - 1).orientation
        }
    }

    /// Length below which vectors count as degenerate.
    #[must_use]
    pub const fn min_distance(&self) -> f32 {
        self.min_distance
    }

    /// Update the degeneracy threshold.
    pub fn set_min_distance(&mut self, min_distance: f32) {
        self.min_distance = min_distance;
    }

    // -- error metric ---------------------------------------------------------

    /// Error of the working configuration against the target.
    #[must_use]
    pub fn working_error(&self) -> f32 {
        self.pose_error(&self.cache)
    }

    /// Error of the authoritative configuration against the target.
    #[must_use]
    pub fn authoritative_error(&self) -> f32 {
        self.pose_error(&self.authoritative_cache)
    }

    fn pose_error(&self, cache: &TransformCache) -> f32 {
        let entry = cache.entry(self.effector);
        let position_error = (self.target.position - entry.position).norm() / self.search_radius;
        if self.orientation_weight > 0.0 {
            position_error + self.orientation_weight * entry.orientation.angle_to(&self.target.orientation)
        } else {
            position_error
        }
    }

    // -- mutation -------------------------------------------------------------

    /// Joint indices downstream of `index` up to and including the
    /// effector: the entries a rotation at `index` must refresh.
    #[must_use]
    pub fn downstream_of(&self, index: usize) -> Vec<usize> {
        (index + 1..=self.effector).collect()
    }

    /// Apply a world-space rotation at `pivot` on the working copy,
    /// refreshing `affected` entries. Returns the constrained delta.
    pub fn rotate_joint(
        &mut self,
        pivot: usize,
        delta: UnitQuaternion<f32>,
        affected: &[usize],
    ) -> UnitQuaternion<f32> {
        self.cache
            .rotate_joint(&mut self.working, pivot, delta, affected)
    }

    /// Apply a world-space translation at `pivot` on the working copy,
    /// refreshing `affected` entries. Returns the constrained delta.
    pub fn translate_joint(
        &mut self,
        pivot: usize,
        delta: Vector3<f32>,
        affected: &[usize],
    ) -> Vector3<f32> {
        self.cache
            .translate_joint(&mut self.working, pivot, delta, affected)
    }

    /// Rebuild the working cache from scratch (debug aid).
    pub fn rebuild_cache(&mut self) {
        self.cache.rebuild(&self.working);
    }

    // -- rotation ramp --------------------------------------------------------

    /// Update the allowed rotation fraction for iteration `iteration` of
    /// `max_iterations`.
    pub fn set_iteration(&mut self, iteration: u32, max_iterations: u32) {
        self.ramp_fraction = if self.ramp_enabled {
            let progress = if max_iterations <= 1 {
                1.0
            } else {
                iteration as f32 / (max_iterations - 1) as f32
            };
            self.ramp_start + (self.ramp_end - self.ramp_start) * progress.min(1.0)
        } else {
            1.0
        };
    }

    /// Scale a proposed rotation by the current ramp fraction.
    #[must_use]
    pub fn ramped(&self, delta: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        if self.ramp_fraction >= 1.0 {
            *delta
        } else {
            math::scale_rotation(delta, self.ramp_fraction)
        }
    }

    // -- traversal ------------------------------------------------------------

    /// Joint visiting order for one iteration. `flip` reverses the
    /// configured direction (used by alternating traversal).
    #[must_use]
    pub fn joint_order(&self, flip: bool) -> Vec<usize> {
        let ascending = match self.direction {
            TraversalDirection::RootToEffector => !flip,
            TraversalDirection::EffectorToRoot => flip,
        };
        if ascending {
            (0..=self.effector).collect()
        } else {
            (0..=self.effector).rev().collect()
        }
    }

    // -- lifecycle ------------------------------------------------------------

    /// Resynchronize the working copy from the authoritative chain and
    /// re-derive both caches.
    pub fn reset(&mut self) {
        self.working = self.chain.clone();
        self.cache.rebuild(&self.working);
        self.authoritative_cache = self.cache.clone();
    }

    /// Commit the working copy into the authoritative chain.
    pub fn commit(&mut self) {
        self.chain = self.working.clone();
        self.authoritative_cache = self.cache.clone();
    }

    /// Snapshot the working state (chain + cache) for speculative search.
    #[must_use]
    pub fn snapshot(&self) -> (Chain, TransformCache) {
        (self.working.clone(), self.cache.clone())
    }

    /// Restore a snapshot taken with [`Context::snapshot`].
    pub fn restore(&mut self, snapshot: (Chain, TransformCache)) {
        self.working = snapshot.0;
        self.cache = snapshot.1;
    }

    /// Apply one random constrained rotation per joint on the working copy
    /// (deadlock escape). The cache is rebuilt afterwards.
    pub fn perturb(&mut self, rng: &mut ChaCha8Rng, max_angle: f32) {
        if max_angle <= 0.0 {
            return;
        }
        for index in 0..=self.effector {
            let axis = random_axis(rng);
            let angle = rng.gen_range(-max_angle..=max_angle);
            let delta = UnitQuaternion::from_axis_angle(&axis, angle);
            // Constrained via the regular path; no downstream refresh needed,
            // the full rebuild below restores coherence.
            self.cache.rotate_joint(&mut self.working, index, delta, &[]);
        }
        self.cache.rebuild(&self.working);
    }
}

/// Uniformly distributed random unit vector (rejection sampled).
fn random_axis(rng: &mut ChaCha8Rng) -> nalgebra::Unit<Vector3<f32>> {
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0f32..=1.0),
            rng.gen_range(-1.0f32..=1.0),
            rng.gen_range(-1.0f32..=1.0),
        );
        let norm_squared = v.norm_squared();
        if norm_squared > 1e-4 && norm_squared <= 1.0 {
            return nalgebra::Unit::new_normalize(v);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
