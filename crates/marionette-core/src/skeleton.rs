//! Bone arena for articulated skeletons.
//!
//! A [`Skeleton`] stores bones in a flat `Vec`, with parent links kept as
//! indices. Insertion enforces parent-before-child ordering, so any
//! front-to-back walk over the arena visits parents first. World transforms
//! are computed by walking ancestors; the IK transform cache exists so that
//! iterative solvers never have to.

use nalgebra::{UnitQuaternion, Vector3};

use crate::constraint::Constraint;
use crate::error::ChainError;
use crate::types::Pose;

/// A single bone: a joint frame expressed relative to its parent.
#[derive(Debug, Clone)]
pub struct Bone {
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Local rotation relative to the parent frame.
    pub local_rotation: UnitQuaternion<f32>,
    /// Local offset from the parent joint, in the parent frame.
    pub local_translation: Vector3<f32>,
    /// Optional motion constraint, applied in the parent frame.
    pub constraint: Option<Constraint>,
}

impl Bone {
    /// Bone name (not required to be unique).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the parent bone, `None` for a root.
    #[must_use]
    pub const fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Indices of child bones.
    #[must_use]
    pub fn children(&self) -> &[usize] {
        &self.children
    }
}

/// An indexed arena of bones forming one or more trees.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
}

impl Skeleton {
    /// Create an empty skeleton.
    #[must_use]
    pub const fn new() -> Self {
        Self { bones: Vec::new() }
    }

    /// Number of bones.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bones.len()
    }

    /// Whether the skeleton has no bones.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Add a root bone; returns its index.
    pub fn add_root(
        &mut self,
        name: impl Into<String>,
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> usize {
        self.bones.push(Bone {
            name: name.into(),
            parent: None,
            children: Vec::new(),
            local_rotation: rotation,
            local_translation: translation,
            constraint: None,
        });
        self.bones.len() - 1
    }

    /// Add a bone under `parent`; returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::BoneOutOfRange`] if `parent` does not exist.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: usize,
        translation: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Result<usize, ChainError> {
        if parent >= self.bones.len() {
            return Err(ChainError::BoneOutOfRange {
                index: parent,
                len: self.bones.len(),
            });
        }
        let index = self.bones.len();
        self.bones.push(Bone {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            local_rotation: rotation,
            local_translation: translation,
            constraint: None,
        });
        self.bones[parent].children.push(index);
        Ok(index)
    }

    /// Access a bone by index.
    #[must_use]
    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// All bones, in insertion (parent-before-child) order.
    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Mutable access to a bone by index.
    #[must_use]
    pub fn bone_mut(&mut self, index: usize) -> Option<&mut Bone> {
        self.bones.get_mut(index)
    }

    /// Attach a constraint to a bone.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::BoneOutOfRange`] if `index` does not exist.
    pub fn set_constraint(
        &mut self,
        index: usize,
        constraint: Constraint,
    ) -> Result<(), ChainError> {
        let len = self.bones.len();
        let bone = self
            .bones
            .get_mut(index)
            .ok_or(ChainError::BoneOutOfRange { index, len })?;
        bone.constraint = Some(constraint);
        Ok(())
    }

    /// World pose of a bone, by walking its ancestor chain.
    ///
    /// O(depth); iterative edits should go through the solver's transform
    /// cache instead.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn world_pose(&self, index: usize) -> Pose {
        let mut lineage = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            lineage.push(i);
            current = self.bones[i].parent;
        }
        let mut pose = Pose::identity();
        for &i in lineage.iter().rev() {
            let bone = &self.bones[i];
            pose.position += pose.orientation * bone.local_translation;
            pose.orientation *= bone.local_rotation;
        }
        pose
    }

    /// Ordered bone indices from `ancestor` down to `descendant`, inclusive.
    ///
    /// Returns `None` when `descendant` is not in `ancestor`'s subtree.
    #[must_use]
    pub fn path_between(&self, ancestor: usize, descendant: usize) -> Option<Vec<usize>> {
        if ancestor >= self.bones.len() || descendant >= self.bones.len() {
            return None;
        }
        let mut path = vec![descendant];
        let mut current = descendant;
        while current != ancestor {
            current = self.bones[current].parent?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Indices of all leaf bones (no children) in the subtree of `root`.
    #[must_use]
    pub fn leaves_of(&self, root: usize) -> Vec<usize> {
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            let bone = &self.bones[i];
            if bone.children.is_empty() {
                leaves.push(i);
            } else {
                // Reverse push keeps discovery order stable (left-to-right).
                stack.extend(bone.children.iter().rev());
            }
        }
        leaves
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
