//! Kinematic chain extracted from a [`Skeleton`].
//!
//! A [`Chain`] is an ordered list of joints from a base bone down to an end
//! bone, each storing its local pose and a snapshot of its constraint. The
//! solver mutates chains, never the skeleton directly; results are copied
//! back with [`Chain::write_back`].

use nalgebra::{UnitQuaternion, Vector3};

use marionette_core::constraint::Constraint;
use marionette_core::error::ChainError;
use marionette_core::skeleton::Skeleton;
use marionette_core::types::Pose;

/// A single joint in a kinematic chain.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Name of the bone this joint was extracted from.
    pub name: String,
    /// Local rotation relative to the previous joint's frame.
    pub rotation: UnitQuaternion<f32>,
    /// Local offset from the previous joint, in its frame.
    pub translation: Vector3<f32>,
    /// Motion constraint, applied in the previous joint's frame.
    pub constraint: Option<Constraint>,
}

impl Joint {
    /// Create an unconstrained joint.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Self {
        Self {
            name: name.into(),
            rotation,
            translation,
            constraint: None,
        }
    }

    /// Attach a constraint, builder-style.
    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

/// An ordered kinematic chain, base joint first.
#[derive(Debug, Clone)]
pub struct Chain {
    joints: Vec<Joint>,
    /// World pose of the base joint's parent frame.
    base: Pose,
}

impl Chain {
    /// Build a chain from joints and the world pose of the frame the first
    /// joint is expressed in.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Empty`] for an empty joint list.
    pub fn new(joints: Vec<Joint>, base: Pose) -> Result<Self, ChainError> {
        if joints.is_empty() {
            return Err(ChainError::Empty);
        }
        Ok(Self { joints, base })
    }

    /// Extract a chain covering `bones`, which must be consecutive
    /// parent/child indices into `skeleton` (as produced by
    /// [`Skeleton::path_between`]).
    ///
    /// # Errors
    ///
    /// Fails on an empty list, unknown indices, or a broken parent link.
    pub fn from_skeleton(skeleton: &Skeleton, bones: &[usize]) -> Result<Self, ChainError> {
        let first = *bones.first().ok_or(ChainError::Empty)?;
        let mut joints = Vec::with_capacity(bones.len());
        for (position, &index) in bones.iter().enumerate() {
            let bone = skeleton.bone(index).ok_or(ChainError::BoneOutOfRange {
                index,
                len: skeleton.len(),
            })?;
            if position > 0 && bone.parent() != Some(bones[position - 1]) {
                return Err(ChainError::NotConsecutive {
                    first: bones[position - 1],
                    second: index,
                });
            }
            joints.push(Joint {
                name: bone.name().to_owned(),
                rotation: bone.local_rotation,
                translation: bone.local_translation,
                constraint: bone.constraint.clone(),
            });
        }

        let base = match skeleton.bone(first).and_then(|bone| bone.parent()) {
            Some(parent) => skeleton.world_pose(parent),
            None => Pose::identity(),
        };
        Ok(Self { joints, base })
    }

    /// Copy this chain's local poses back onto `bones` in `skeleton`.
    ///
    /// # Errors
    ///
    /// Fails if `bones` does not match the chain's length or indexes an
    /// unknown bone.
    pub fn write_back(&self, skeleton: &mut Skeleton, bones: &[usize]) -> Result<(), ChainError> {
        if bones.len() != self.joints.len() {
            return Err(ChainError::LengthMismatch {
                expected: self.joints.len(),
                got: bones.len(),
            });
        }
        let len = skeleton.len();
        for (joint, &index) in self.joints.iter().zip(bones) {
            let bone = skeleton
                .bone_mut(index)
                .ok_or(ChainError::BoneOutOfRange { index, len })?;
            bone.local_rotation = joint.rotation;
            bone.local_translation = joint.translation;
        }
        Ok(())
    }

    /// Number of joints.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.joints.len()
    }

    /// Whether the chain has no joints. Construction forbids this; kept for
    /// API symmetry.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Access a joint.
    #[must_use]
    pub fn joint(&self, index: usize) -> &Joint {
        &self.joints[index]
    }

    /// Mutable access to a joint.
    #[must_use]
    pub fn joint_mut(&mut self, index: usize) -> &mut Joint {
        &mut self.joints[index]
    }

    /// All joints, base first.
    #[must_use]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// World pose of the base joint's parent frame.
    #[must_use]
    pub const fn base(&self) -> &Pose {
        &self.base
    }

    /// Replace the base pose (used when a parent segment moved).
    pub fn set_base(&mut self, base: Pose) {
        self.base = base;
    }

    /// Total bone length: the sum of inter-joint offsets, excluding the
    /// base offset of the first joint.
    #[must_use]
    pub fn reach(&self) -> f32 {
        self.joints
            .iter()
            .skip(1)
            .map(|joint| joint.translation.norm())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
