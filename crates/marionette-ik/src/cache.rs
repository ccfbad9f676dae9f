//! Incremental world-transform cache for a kinematic chain.
//!
//! One [`CacheEntry`] per chain joint, stored in an arena parallel to the
//! chain; entry `i`'s reference frame is entry `i - 1` (the chain's base
//! pose for the first entry). Updates are O(1) per entry:
//!
//! ```text
//! orientation[i] = orientation[i-1] * local_rotation[i]
//! position[i]    = position[i-1] + orientation[i-1] * local_translation[i]
//! ```
//!
//! The mutating operations take an explicit list of *other* entries sharing
//! the same world-space delta and refresh exactly those. Entries not named
//! stay stale until refreshed: callers own cache coherence, which is why
//! every heuristic states exactly which joints it touches.

use nalgebra::{UnitQuaternion, Vector3};

use crate::chain::Chain;

/// Cached world transform of one chain joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheEntry {
    /// World position of the joint.
    pub position: Vector3<f32>,
    /// World orientation of the joint.
    pub orientation: UnitQuaternion<f32>,
}

impl CacheEntry {
    fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

/// Arena of cached world transforms, parallel to one [`Chain`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformCache {
    entries: Vec<CacheEntry>,
}

impl TransformCache {
    /// Create a cache with `len` identity entries; call
    /// [`rebuild`](Self::rebuild) before reading.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            entries: vec![CacheEntry::identity(); len],
        }
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Access an entry.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn entry(&self, index: usize) -> &CacheEntry {
        &self.entries[index]
    }

    /// Recompute every entry from the chain, parent before child.
    pub fn rebuild(&mut self, chain: &Chain) {
        for index in 0..self.entries.len() {
            self.update_from_parent(chain, index);
        }
    }

    /// Recompute entry `index` from its parent entry, which must be valid.
    pub fn update_from_parent(&mut self, chain: &Chain, index: usize) {
        let (parent_position, parent_orientation) = if index == 0 {
            (chain.base().position, chain.base().orientation)
        } else {
            let parent = &self.entries[index - 1];
            (parent.position, parent.orientation)
        };
        let joint = chain.joint(index);
        self.entries[index] = CacheEntry {
            position: parent_position + parent_orientation * joint.translation,
            orientation: parent_orientation * joint.rotation,
        };
    }

    /// Recompute entry `index` from its child entry `index + 1`, which must
    /// be valid. Used when walking a chain bottom-up.
    ///
    /// # Panics
    ///
    /// Panics if `index + 1` is out of range.
    pub fn update_from_child(&mut self, chain: &Chain, index: usize) {
        let child_joint = chain.joint(index + 1);
        let child = self.entries[index + 1];
        let orientation = child.orientation * child_joint.rotation.inverse();
        self.entries[index] = CacheEntry {
            position: child.position - orientation * child_joint.translation,
            orientation,
        };
    }

    /// Apply a world-space `delta` rotation at joint `pivot`, clamped by the
    /// joint's constraint, then refresh the cache of `pivot` plus every
    /// entry in `affected` (which share the delta rigidly, rotating about
    /// the pivot's position).
    ///
    /// Returns the world-space rotation actually applied after
    /// constraining.
    pub fn rotate_joint(
        &mut self,
        chain: &mut Chain,
        pivot: usize,
        delta: UnitQuaternion<f32>,
        affected: &[usize],
    ) -> UnitQuaternion<f32> {
        let parent_orientation = if pivot == 0 {
            chain.base().orientation
        } else {
            self.entries[pivot - 1].orientation
        };

        let joint = chain.joint_mut(pivot);
        let proposed_local =
            parent_orientation.inverse() * delta * parent_orientation * joint.rotation;
        let allowed_local = match &joint.constraint {
            Some(constraint) => constraint.constrain_rotation(proposed_local, joint.rotation),
            None => proposed_local,
        };
        joint.rotation = allowed_local;

        let old_orientation = self.entries[pivot].orientation;
        let new_orientation = parent_orientation * allowed_local;
        let applied = new_orientation * old_orientation.inverse();
        self.entries[pivot].orientation = new_orientation;

        let pivot_position = self.entries[pivot].position;
        for &index in affected {
            let entry = &mut self.entries[index];
            entry.position = pivot_position + applied * (entry.position - pivot_position);
            entry.orientation = applied * entry.orientation;
        }
        applied
    }

    /// Apply a world-space `delta` translation at joint `pivot`, clamped by
    /// the joint's constraint, then shift the cache of `pivot` plus every
    /// entry in `affected`.
    ///
    /// Returns the world-space translation actually applied.
    pub fn translate_joint(
        &mut self,
        chain: &mut Chain,
        pivot: usize,
        delta: Vector3<f32>,
        affected: &[usize],
    ) -> Vector3<f32> {
        let parent_orientation = if pivot == 0 {
            chain.base().orientation
        } else {
            self.entries[pivot - 1].orientation
        };

        let joint = chain.joint_mut(pivot);
        let proposed_local = joint.translation + parent_orientation.inverse_transform_vector(&delta);
        let allowed_local = match &joint.constraint {
            Some(constraint) => constraint.constrain_translation(proposed_local, joint.translation),
            None => proposed_local,
        };
        let applied = parent_orientation * (allowed_local - joint.translation);
        joint.translation = allowed_local;

        self.entries[pivot].position += applied;
        for &index in affected {
            self.entries[index].position += applied;
        }
        applied
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
    use marionette_core::types::Pose;
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

    /// Reference world pose computed naively from the chain locals.
    fn naive_world(chain: &Chain, index: usize) -> CacheEntry {
        let mut position = chain.base().position;
        let mut orientation = chain.base().orientation;
        for i in 0..=index {
            let joint = chain.joint(i);
            position += orientation * joint.translation;
            orientation *= joint.rotation;
        }
        CacheEntry {
            position,
            orientation,
        }
    }

    #[test]
    fn rebuild_matches_naive_recompute() {
        let mut chain = straight_chain(4);
        chain.joint_mut(1).rotation =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3);
        chain.joint_mut(2).rotation =
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -0.7);
        let mut cache = TransformCache::new(chain.len());
        cache.rebuild(&chain);
        for i in 0..chain.len() {
            let expected = naive_world(&chain, i);
            assert_relative_eq!(cache.entry(i).position, expected.position, epsilon = 1e-5);
            assert_relative_eq!(
                cache.entry(i).orientation.angle_to(&expected.orientation),
                0.0,
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn update_from_child_inverts_update_from_parent() {
        let mut chain = straight_chain(3);
        chain.joint_mut(1).rotation =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.9);
        let mut cache = TransformCache::new(chain.len());
        cache.rebuild(&chain);

        let expected = *cache.entry(1);
        // Scribble over entry 1, then restore it from its valid child.
        let mut cache = cache.clone();
        cache.entries[1] = CacheEntry::identity();
        cache.update_from_child(&chain, 1);
        assert_relative_eq!(cache.entry(1).position, expected.position, epsilon = 1e-5);
        assert_relative_eq!(
            cache.entry(1).orientation.angle_to(&expected.orientation),
            0.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn rotate_joint_keeps_named_entries_coherent() {
        let mut chain = straight_chain(4);
        let mut cache = TransformCache::new(chain.len());
        cache.rebuild(&chain);

        let delta = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.5);
        cache.rotate_joint(&mut chain, 1, delta, &[2, 3]);

        for i in 0..chain.len() {
            let expected = naive_world(&chain, i);
            assert_relative_eq!(cache.entry(i).position, expected.position, epsilon = 1e-4);
            assert_relative_eq!(
                cache.entry(i).orientation.angle_to(&expected.orientation),
                0.0,
                epsilon = 1e-4
            );
        }
    }

    #[test]
    fn rotate_joint_returns_constrained_delta() {
        let mut chain = straight_chain(3);
        chain.joint_mut(1).constraint = Some(Constraint::Hinge(Hinge::new(
            Vector3::z_axis(),
            -0.2,
            0.2,
        )));
        let mut cache = TransformCache::new(chain.len());
        cache.rebuild(&chain);

        let delta = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.0);
        let applied = cache.rotate_joint(&mut chain, 1, delta, &[2]);
        assert_relative_eq!(applied.angle(), 0.2, epsilon = 1e-4);
        // Cache still coherent under the clamped rotation.
        let expected = naive_world(&chain, 2);
        assert_relative_eq!(cache.entry(2).position, expected.position, epsilon = 1e-4);
    }

    #[test]
    fn unnamed_entries_stay_stale() {
        let mut chain = straight_chain(4);
        let mut cache = TransformCache::new(chain.len());
        cache.rebuild(&chain);
        let before = *cache.entry(3);

        let delta = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.5);
        cache.rotate_joint(&mut chain, 0, delta, &[1, 2]);

        // Entry 3 was not named, so it still holds the old transform.
        assert_eq!(*cache.entry(3), before);
        // Refreshing it from its (valid) parent catches it up.
        cache.update_from_parent(&chain, 3);
        let expected = naive_world(&chain, 3);
        assert_relative_eq!(cache.entry(3).position, expected.position, epsilon = 1e-4);
    }

    #[test]
    fn translate_joint_shifts_named_entries() {
        let mut chain = straight_chain(3);
        let mut cache = TransformCache::new(chain.len());
        cache.rebuild(&chain);

        let delta = Vector3::new(0.0, 2.0, 0.0);
        let applied = cache.translate_joint(&mut chain, 1, delta, &[2]);
        assert_relative_eq!(applied, delta, epsilon = 1e-6);
        let expected = naive_world(&chain, 2);
        assert_relative_eq!(cache.entry(2).position, expected.position, epsilon = 1e-5);
    }

    #[test]
    fn hinge_joint_refuses_translation() {
        let mut chain = straight_chain(3);
        chain.joint_mut(1).constraint = Some(Constraint::Hinge(Hinge::new(
            Vector3::z_axis(),
            -1.0,
            1.0,
        )));
        let mut cache = TransformCache::new(chain.len());
        cache.rebuild(&chain);

        let applied = cache.translate_joint(&mut chain, 1, Vector3::new(0.0, 2.0, 0.0), &[2]);
        assert_relative_eq!(applied.norm(), 0.0, epsilon = 1e-6);
    }
}
