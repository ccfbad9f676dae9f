//! Whole-skeleton solver built from per-segment chain solvers.
//!
//! The skeleton is decomposed into chain segments split at branch points
//! and leaves, each wrapped in its own [`ChainSolver`]. A solve pass walks
//! the segments in post-order (children before parents): leaf segments
//! chase their own targets, internal segments chase an aggregate goal
//! derived from every targeted descendant (a centroid shift for position
//! plus a rigid-registration fit for the terminal rotation) and hand a
//! damped corrective rotation up to their parent so upstream links
//! contribute too.
//!
//! Across passes the tree tracks its best-seen global configuration and a
//! trust factor that decays when the aggregate error regresses; once trust
//! falls below threshold the skeleton reverts to the best configuration.

use std::collections::BTreeMap;

use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, trace};

use marionette_core::config::TreeConfig;
use marionette_core::error::{ChainError, MarionetteError};
use marionette_core::math;
use marionette_core::seed::derive_seed_indexed;
use marionette_core::skeleton::Skeleton;
use marionette_core::types::Pose;

use crate::chain::Chain;
use crate::chain_solver::{ChainSolver, SolverState};
use crate::heuristics::HeuristicKind;
use crate::registration;

/// One chain segment of the decomposed skeleton.
#[derive(Debug)]
struct Segment {
    /// Consecutive bone indices, base first.
    bones: Vec<usize>,
    /// Parent segment index.
    parent: Option<usize>,
    /// Targeted end bones at or below this segment's end, refreshed when
    /// targets change.
    reachable: Vec<usize>,
    solver: ChainSolver,
}

impl Segment {
    fn end_bone(&self) -> usize {
        *self.bones.last().expect("segments are never empty")
    }
}

/// Snapshot of every bone's local pose.
type PoseSnapshot = Vec<(UnitQuaternion<f32>, Vector3<f32>)>;

/// Heuristic IK solver for a branching skeleton.
#[derive(Debug)]
pub struct TreeSolver {
    skeleton: Skeleton,
    root: usize,
    segments: Vec<Segment>,
    /// Children before parents.
    post_order: Vec<usize>,
    /// Segment index owning each targetable (segment-end) bone.
    end_bones: BTreeMap<usize, usize>,
    targets: BTreeMap<usize, Pose>,
    config: TreeConfig,
    state: SolverState,
    initial: PoseSnapshot,
    best: Option<(f32, f32, PoseSnapshot)>,
    trust: f32,
    previous_error: f32,
    passes: u32,
    last_passes: u32,
    budget: f32,
    targets_changed: bool,
}

impl TreeSolver {
    /// Decompose the subtree under `root` and build one chain solver per
    /// segment. Every segment derives its own RNG seed from
    /// `config.chain.seed`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config or an unknown root bone.
    pub fn new(
        skeleton: Skeleton,
        root: usize,
        heuristic: &HeuristicKind,
        config: TreeConfig,
    ) -> Result<Self, MarionetteError> {
        config.validate()?;
        if root >= skeleton.len() {
            return Err(ChainError::BoneOutOfRange {
                index: root,
                len: skeleton.len(),
            }
            .into());
        }

        let mut segments = Vec::new();
        let mut pending = vec![(root, None::<usize>)];
        while let Some((start, parent)) = pending.pop() {
            let mut bones = vec![start];
            let mut current = start;
            loop {
                let children = skeleton.bone(current).expect("bone exists").children();
                if children.len() == 1 {
                    current = children[0];
                    bones.push(current);
                } else {
                    let segment_index = segments.len();
                    for &child in children {
                        pending.push((child, Some(segment_index)));
                    }
                    break;
                }
            }

            let chain = Chain::from_skeleton(&skeleton, &bones)?;
            let mut chain_config = config.chain.clone();
            chain_config.seed = derive_seed_indexed(config.chain.seed, segments.len() as u64);
            let solver = ChainSolver::new(chain, heuristic, chain_config)?;
            segments.push(Segment {
                bones,
                parent,
                reachable: Vec::new(),
                solver,
            });
        }

        // Children were pushed after their parents, so reversing the
        // discovery order yields a valid post-order.
        let post_order: Vec<usize> = (0..segments.len()).rev().collect();
        let end_bones = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| (segment.end_bone(), index))
            .collect();
        let initial = snapshot(&skeleton);
        Ok(Self {
            skeleton,
            root,
            segments,
            post_order,
            end_bones,
            targets: BTreeMap::new(),
            config,
            state: SolverState::Idle,
            initial,
            best: None,
            trust: 1.0,
            previous_error: f32::INFINITY,
            passes: 0,
            last_passes: 0,
            budget: 0.0,
            targets_changed: false,
        })
    }

    // -- targets --------------------------------------------------------------

    /// Set the target pose for a segment-end bone (a leaf or branch point).
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::NotATargetBone`] for a bone that does not end
    /// a segment of this tree, [`ChainError::BoneOutOfRange`] for an
    /// unknown index.
    pub fn set_target(&mut self, bone: usize, target: Pose) -> Result<(), ChainError> {
        if bone >= self.skeleton.len() {
            return Err(ChainError::BoneOutOfRange {
                index: bone,
                len: self.skeleton.len(),
            });
        }
        if !self.end_bones.contains_key(&bone) {
            return Err(ChainError::NotATargetBone { bone });
        }
        self.targets.insert(bone, target);
        self.recompute_reachable();
        self.targets_changed = true;
        Ok(())
    }

    /// Remove the target on `bone`, if any.
    pub fn clear_target(&mut self, bone: usize) {
        if self.targets.remove(&bone).is_some() {
            self.recompute_reachable();
            self.targets_changed = true;
        }
    }

    /// Targeted descendants are recomputed bottom-up whenever the target
    /// set changes.
    fn recompute_reachable(&mut self) {
        for &index in &self.post_order.clone() {
            let mut reachable: Vec<usize> = Vec::new();
            for other in 0..self.segments.len() {
                if self.segments[other].parent == Some(index) {
                    reachable.extend(self.segments[other].reachable.iter().copied());
                }
            }
            let end = self.segments[index].end_bone();
            if self.targets.contains_key(&end) {
                reachable.push(end);
            }
            self.segments[index].reachable = reachable;
        }
    }

    // -- configuration --------------------------------------------------------

    /// Update the convergence threshold, tree-wide.
    pub fn set_max_error(&mut self, max_error: f32) {
        self.config.chain.max_error = max_error;
        for segment in &mut self.segments {
            segment.solver.set_max_error(max_error);
        }
    }

    /// Update the pass cap and every segment's iteration cap.
    pub fn set_max_iterations(&mut self, max_iterations: u32) {
        self.config.chain.max_iterations = max_iterations;
        for segment in &mut self.segments {
            segment.solver.set_max_iterations(max_iterations);
        }
    }

    /// Update the fractional per-call budget, tree-wide.
    pub fn set_times_per_frame(&mut self, times_per_frame: f32) {
        self.config.chain.times_per_frame = times_per_frame;
        for segment in &mut self.segments {
            segment.solver.set_times_per_frame(times_per_frame);
        }
    }

    /// Update the degeneracy threshold, tree-wide.
    pub fn set_min_distance(&mut self, min_distance: f32) {
        self.config.chain.min_distance = min_distance;
        for segment in &mut self.segments {
            segment.solver.set_min_distance(min_distance);
        }
    }

    // -- inspection -----------------------------------------------------------

    /// Aggregate error: summed per-target error of the current skeleton.
    #[must_use]
    pub fn error(&self) -> f32 {
        let chain = &self.config.chain;
        self.targets
            .iter()
            .map(|(&bone, target)| {
                let pose = self.skeleton.world_pose(bone);
                let mut error = (target.position - pose.position).norm() / chain.search_radius;
                if chain.orientation_weight > 0.0 {
                    error += chain.orientation_weight * pose.angle_to(target);
                }
                error
            })
            .sum()
    }

    /// Tree passes run by the most recent `solve()` call.
    #[must_use]
    pub const fn last_iteration_count(&self) -> u32 {
        self.last_passes
    }

    /// Current solver state.
    #[must_use]
    pub const fn state(&self) -> SolverState {
        self.state
    }

    /// The solved skeleton.
    #[must_use]
    pub const fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// Mutable access to the skeleton (invalidates nothing; segments resync
    /// from the skeleton every pass).
    #[must_use]
    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    /// Consume the solver, returning the skeleton.
    #[must_use]
    pub fn into_skeleton(self) -> Skeleton {
        self.skeleton
    }

    /// The bone the decomposition is rooted at.
    #[must_use]
    pub const fn root(&self) -> usize {
        self.root
    }

    // -- lifecycle ------------------------------------------------------------

    /// Re-baseline on the skeleton's current configuration: clears the
    /// best-seen snapshot, restores full trust and restarts the pass
    /// budget.
    pub fn reset(&mut self) {
        self.initial = snapshot(&self.skeleton);
        self.best = None;
        self.trust = 1.0;
        self.previous_error = self.error();
        self.passes = 0;
        self.last_passes = 0;
        self.budget = 0.0;
        self.targets_changed = false;
        self.state = SolverState::Prepared;
    }

    /// Advance the solve by this call's share of tree passes.
    ///
    /// Target changes force a reset. Passes run until the fractional
    /// times-per-frame budget is exhausted, the aggregate error reaches
    /// `max_error`, or the pass cap is hit.
    pub fn solve(&mut self) {
        if self.targets_changed || self.state == SolverState::Idle {
            self.reset();
        }
        self.last_passes = 0;

        if self.targets.is_empty() || self.error() <= self.config.chain.max_error {
            self.state = SolverState::Converged;
            return;
        }
        if matches!(self.state, SolverState::Converged | SolverState::Exhausted) {
            return;
        }

        self.budget += self.config.chain.times_per_frame;
        while self.budget >= 1.0 {
            self.budget -= 1.0;
            self.pass();
            self.last_passes += 1;

            if self.error() <= self.config.chain.max_error {
                self.state = SolverState::Converged;
                break;
            }
            if self.passes >= self.config.chain.max_iterations {
                self.state = SolverState::Exhausted;
                break;
            }
        }
    }

    // -- one tree pass --------------------------------------------------------

    fn pass(&mut self) {
        self.state = SolverState::Iterating;

        for &index in &self.post_order.clone() {
            let end = self.segments[index].end_bone();
            let own_target = self.targets.get(&end).copied();
            let descendants: Vec<usize> = self.segments[index]
                .reachable
                .iter()
                .copied()
                .filter(|&bone| bone != end)
                .collect();

            if descendants.is_empty() {
                if let Some(target) = own_target {
                    self.solve_segment(index, target);
                }
            } else {
                self.aggregate_segment(index, end, own_target, &descendants);
            }
        }

        let error = self.error();
        self.track_best(error);
        self.update_trust(error);
        self.previous_error = self.error();
        self.passes += 1;
    }

    /// Resync a segment's chain from the skeleton, run its solver toward
    /// `target`, and write the result back.
    fn solve_segment(&mut self, index: usize, target: Pose) {
        let segment = &mut self.segments[index];
        let chain = Chain::from_skeleton(&self.skeleton, &segment.bones)
            .expect("segment bones stay consecutive");
        if segment.solver.load_chain(chain).is_err() {
            return;
        }
        segment.solver.set_target(target);
        segment.solver.solve();
        let _ = segment.solver.write_back(&mut self.skeleton, &segment.bones);
    }

    /// Internal node with targeted descendants: derive an aggregate goal
    /// for the segment end from the current and desired offsets of every
    /// reachable targeted bone, refine the terminal rotation with a rigid
    /// registration fit, re-solve the segment, and pass a damped corrective
    /// rotation to the parent's terminal joint.
    fn aggregate_segment(
        &mut self,
        index: usize,
        end: usize,
        own_target: Option<Pose>,
        descendants: &[usize],
    ) {
        let end_pose = self.skeleton.world_pose(end);

        // Offsets in the segment end's local frame.
        let mut sources = Vec::with_capacity(descendants.len() + 1);
        let mut destinations = Vec::with_capacity(descendants.len() + 1);
        for &bone in descendants {
            let current = self.skeleton.world_pose(bone).position;
            let desired = self.targets[&bone].position;
            sources.push(end_pose.inverse_transform_point(&current));
            destinations.push(end_pose.inverse_transform_point(&desired));
        }
        if let Some(target) = own_target {
            sources.push(Vector3::zeros());
            destinations.push(end_pose.inverse_transform_point(&target.position));
        }

        let n = sources.len() as f32;
        let source_centroid =
            sources.iter().fold(Vector3::zeros(), |acc, v| acc + v) / n;
        let destination_centroid =
            destinations.iter().fold(Vector3::zeros(), |acc, v| acc + v) / n;
        let goal_position =
            end_pose.transform_point(&(destination_centroid - source_centroid));

        // Terminal rotation refinement over the centered offset pairs.
        let centered_sources: Vec<Vector3<f32>> =
            sources.iter().map(|s| s - source_centroid).collect();
        let centered_destinations: Vec<Vector3<f32>> = destinations
            .iter()
            .map(|d| d - destination_centroid)
            .collect();
        let fit = registration::fit_rotation(&centered_sources, &centered_destinations, None);
        let fit_accepted = fit.angle() >= self.config.fit_angle_threshold && {
            let power = self.config.residual_power;
            let before = registration::residual(
                &centered_sources,
                &centered_destinations,
                &UnitQuaternion::identity(),
                None,
                power,
            );
            let after =
                registration::residual(&centered_sources, &centered_destinations, &fit, None, power);
            after < before
        };

        if fit_accepted {
            trace!(segment = index, angle = fit.angle(), "registration fit applied");
            self.rotate_bone_locally(end, fit);
        }

        let goal_orientation = self.skeleton.world_pose(end).orientation;
        self.solve_segment(index, Pose::new(goal_position, goal_orientation));

        // moveParent: let upstream links carry part of the remaining error.
        if let Some(parent_index) = self.segments[index].parent {
            self.move_parent(parent_index, end, goal_position);
        }
    }

    /// Damped corrective rotation at the parent's terminal joint, steering
    /// the (possibly still short) segment end toward its goal.
    fn move_parent(&mut self, parent_index: usize, end: usize, goal_position: Vector3<f32>) {
        let parent_end = self.segments[parent_index].end_bone();
        let pivot = self.skeleton.world_pose(parent_end).position;
        let current = self.skeleton.world_pose(end).position - pivot;
        let desired = goal_position - pivot;
        let min_distance = self.config.chain.min_distance;
        if current.norm() < min_distance || desired.norm() < min_distance {
            return;
        }
        let correction = math::scale_rotation(
            &math::shortest_arc(&current, &desired),
            self.config.parent_damping,
        );
        self.rotate_bone_world(parent_end, correction);
    }

    /// Apply a rotation expressed in `bone`'s own frame, constrained.
    fn rotate_bone_locally(&mut self, bone: usize, delta: UnitQuaternion<f32>) {
        let Some(bone_ref) = self.skeleton.bone_mut(bone) else {
            return;
        };
        let proposed = bone_ref.local_rotation * delta;
        bone_ref.local_rotation = match &bone_ref.constraint {
            Some(constraint) => constraint.constrain_rotation(proposed, bone_ref.local_rotation),
            None => proposed,
        };
    }

    /// Apply a world-space rotation to `bone`, constrained.
    fn rotate_bone_world(&mut self, bone: usize, delta: UnitQuaternion<f32>) {
        let parent_orientation = match self.skeleton.bone(bone).and_then(|b| b.parent()) {
            Some(parent) => self.skeleton.world_pose(parent).orientation,
            None => UnitQuaternion::identity(),
        };
        let world = self.skeleton.world_pose(bone).orientation;
        let proposed = parent_orientation.inverse() * delta * world;
        let Some(bone_ref) = self.skeleton.bone_mut(bone) else {
            return;
        };
        bone_ref.local_rotation = match &bone_ref.constraint {
            Some(constraint) => constraint.constrain_rotation(proposed, bone_ref.local_rotation),
            None => proposed,
        };
    }

    // -- best configuration and trust -----------------------------------------

    fn rotation_distance(&self) -> f32 {
        self.skeleton
            .bones()
            .iter()
            .zip(self.initial.iter())
            .map(|(bone, (rotation, _))| bone.local_rotation.angle_to(rotation))
            .sum()
    }

    fn track_best(&mut self, error: f32) {
        let distance = self.rotation_distance();
        let better = match &self.best {
            None => true,
            Some((best_error, best_distance, _)) => {
                error < *best_error - 1e-6
                    || (error <= *best_error + 1e-6 && distance < *best_distance)
            }
        };
        if better {
            self.best = Some((error, distance, snapshot(&self.skeleton)));
        }
    }

    fn update_trust(&mut self, error: f32) {
        if error > self.previous_error + 1e-6 {
            self.trust *= self.config.trust_decay;
            if self.trust < self.config.trust_threshold {
                if let Some((best_error, _, poses)) = &self.best {
                    debug!(
                        best_error = *best_error,
                        "trust exhausted, reverting to best configuration"
                    );
                    restore(&mut self.skeleton, poses);
                }
                self.trust = 1.0;
            }
        } else {
            self.trust = 1.0;
        }
    }
}

fn snapshot(skeleton: &Skeleton) -> PoseSnapshot {
    skeleton
        .bones()
        .iter()
        .map(|bone| (bone.local_rotation, bone.local_translation))
        .collect()
}

fn restore(skeleton: &mut Skeleton, poses: &PoseSnapshot) {
    for (index, (rotation, translation)) in poses.iter().enumerate() {
        if let Some(bone) = skeleton.bone_mut(index) {
            bone.local_rotation = *rotation;
            bone.local_translation = *translation;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marionette_core::config::SolverConfig;
    use nalgebra::Vector3;

    /// Y-shaped skeleton: a 2-bone trunk splitting into two 2-bone arms.
    /// Returns (skeleton, left tip, right tip).
    fn y_skeleton() -> (Skeleton, usize, usize) {
        let mut skel = Skeleton::new();
        let root = skel.add_root("root", Vector3::zeros(), UnitQuaternion::identity());
        let trunk = skel
            .add_bone("trunk", root, Vector3::new(0.0, 1.0, 0.0), UnitQuaternion::identity())
            .unwrap();
        let left_a = skel
            .add_bone("left_a", trunk, Vector3::new(-1.0, 0.0, 0.0), UnitQuaternion::identity())
            .unwrap();
        let left_tip = skel
            .add_bone("left_tip", left_a, Vector3::new(-1.0, 0.0, 0.0), UnitQuaternion::identity())
            .unwrap();
        let right_a = skel
            .add_bone("right_a", trunk, Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity())
            .unwrap();
        let right_tip = skel
            .add_bone("right_tip", right_a, Vector3::new(1.0, 0.0, 0.0), UnitQuaternion::identity())
            .unwrap();
        (skel, left_tip, right_tip)
    }

    fn tree_config() -> TreeConfig {
        TreeConfig {
            chain: SolverConfig {
                times_per_frame: 20.0,
                ..SolverConfig::default()
            },
            ..TreeConfig::default()
        }
    }

    fn solver_for(skeleton: Skeleton) -> TreeSolver {
        TreeSolver::new(skeleton, 0, &HeuristicKind::Ccd, tree_config()).unwrap()
    }

    #[test]
    fn decomposes_at_branch_points() {
        let (skel, left_tip, right_tip) = y_skeleton();
        let solver = solver_for(skel);
        // Trunk + two arms.
        assert_eq!(solver.segments.len(), 3);
        let end_bones: Vec<usize> = solver.end_bones.keys().copied().collect();
        assert!(end_bones.contains(&left_tip));
        assert!(end_bones.contains(&right_tip));
    }

    #[test]
    fn rejects_targets_on_mid_segment_bones() {
        let (skel, _, _) = y_skeleton();
        let mut solver = solver_for(skel);
        // Bone 0 (root) is mid-segment: the trunk ends at bone 1.
        assert!(matches!(
            solver.set_target(0, Pose::identity()),
            Err(ChainError::NotATargetBone { bone: 0 })
        ));
        assert!(matches!(
            solver.set_target(99, Pose::identity()),
            Err(ChainError::BoneOutOfRange { .. })
        ));
    }

    #[test]
    fn single_target_tree_reaches_it() {
        let (skel, left_tip, _) = y_skeleton();
        let mut solver = solver_for(skel);
        solver
            .set_target(left_tip, Pose::from_position(Vector3::new(-1.5, 2.0, 0.0)))
            .unwrap();
        for _ in 0..40 {
            solver.solve();
        }
        assert!(
            solver.error() < 0.05,
            "aggregate error {} too large",
            solver.error()
        );
    }

    #[test]
    fn two_target_tree_reduces_aggregate_error() {
        let (skel, left_tip, right_tip) = y_skeleton();
        let mut solver = solver_for(skel);
        solver
            .set_target(left_tip, Pose::from_position(Vector3::new(-1.2, 2.2, 0.0)))
            .unwrap();
        solver
            .set_target(right_tip, Pose::from_position(Vector3::new(1.2, 2.2, 0.0)))
            .unwrap();
        let before = solver.error();
        for _ in 0..60 {
            solver.solve();
        }
        assert!(
            solver.error() < before * 0.2,
            "aggregate error only fell from {before} to {}",
            solver.error()
        );
    }

    #[test]
    fn reached_targets_are_a_fixed_point() {
        let (skel, left_tip, right_tip) = y_skeleton();
        let left_pose = skel.world_pose(left_tip);
        let right_pose = skel.world_pose(right_tip);
        let mut solver = solver_for(skel);
        solver.set_target(left_tip, left_pose).unwrap();
        solver.set_target(right_tip, right_pose).unwrap();

        // The public path converges without iterating.
        solver.solve();
        assert_eq!(solver.state(), SolverState::Converged);
        assert_relative_eq!(solver.error(), 0.0, epsilon = 1e-4);

        // Even a forced pass must not disturb the solved configuration.
        solver.reset();
        solver.pass();
        assert_relative_eq!(solver.error(), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn target_change_resets_pass_counter() {
        let (skel, left_tip, _) = y_skeleton();
        let mut solver = solver_for(skel);
        solver
            .set_target(left_tip, Pose::from_position(Vector3::new(-1.5, 2.0, 0.0)))
            .unwrap();
        solver.solve();

        solver
            .set_target(left_tip, Pose::from_position(Vector3::new(-1.0, 2.4, 0.0)))
            .unwrap();
        solver.solve();
        // The target change re-prepared the solver, so passes ran again.
        assert!(solver.last_iteration_count() >= 1);
    }

    #[test]
    fn nested_branch_recruits_upstream_joints() {
        // root - a - b < (d - d_tip), (e - e_tip): the segment ending at b
        // aggregates both tips and hands a damped correction up to a.
        let mut skel = Skeleton::new();
        let root = skel.add_root("root", Vector3::zeros(), UnitQuaternion::identity());
        let a = skel
            .add_bone("a", root, Vector3::new(0.0, 1.0, 0.0), UnitQuaternion::identity())
            .unwrap();
        let b = skel
            .add_bone("b", a, Vector3::new(0.0, 1.0, 0.0), UnitQuaternion::identity())
            .unwrap();
        // Stub branch so the segment ending at b has a parent segment.
        skel.add_bone("stub", a, Vector3::new(0.3, 0.0, 0.0), UnitQuaternion::identity())
            .unwrap();
        let d = skel
            .add_bone("d", b, Vector3::new(-0.5, 0.5, 0.0), UnitQuaternion::identity())
            .unwrap();
        let d_tip = skel
            .add_bone("d_tip", d, Vector3::new(-0.5, 0.5, 0.0), UnitQuaternion::identity())
            .unwrap();
        let e = skel
            .add_bone("e", b, Vector3::new(0.5, 0.5, 0.0), UnitQuaternion::identity())
            .unwrap();
        let e_tip = skel
            .add_bone("e_tip", e, Vector3::new(0.5, 0.5, 0.0), UnitQuaternion::identity())
            .unwrap();

        let mut solver = solver_for(skel);
        // Both tips pulled sideways: the aggregate goal drags b, and the
        // damped correction must recruit the joints upstream of it.
        solver
            .set_target(d_tip, Pose::from_position(Vector3::new(0.5, 2.8, 0.0)))
            .unwrap();
        solver
            .set_target(e_tip, Pose::from_position(Vector3::new(1.5, 2.3, 0.0)))
            .unwrap();

        let before = solver.error();
        for _ in 0..40 {
            solver.solve();
        }
        assert!(solver.error() < before * 0.5);
        // Upstream joints moved: the trunk is no longer in its rest pose.
        let upstream_moved = solver.skeleton().bone(root).unwrap().local_rotation.angle() > 1e-3
            || solver.skeleton().bone(a).unwrap().local_rotation.angle() > 1e-3;
        assert!(upstream_moved, "upstream joints never contributed");
    }

    #[test]
    fn empty_target_set_is_trivially_converged() {
        let (skel, _, _) = y_skeleton();
        let mut solver = solver_for(skel);
        solver.solve();
        assert_eq!(solver.state(), SolverState::Converged);
        assert_relative_eq!(solver.error(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn unknown_root_fails_fast() {
        let (skel, _, _) = y_skeleton();
        let result = TreeSolver::new(skel, 42, &HeuristicKind::Ccd, tree_config());
        assert!(matches!(result, Err(MarionetteError::Chain(_))));
    }
}
