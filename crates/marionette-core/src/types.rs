use nalgebra::{UnitQuaternion, Vector3};

// ---------------------------------------------------------------------------
// Pose
// ---------------------------------------------------------------------------

/// A world-space position/orientation pair.
///
/// Used for solver targets and world-transform queries. Composition follows
/// the usual convention: `position` first, then `orientation` applied to
/// local offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// World position.
    pub position: Vector3<f32>,
    /// World orientation.
    pub orientation: UnitQuaternion<f32>,
}

impl Pose {
    /// Create a pose from a position and an orientation.
    #[must_use]
    pub const fn new(position: Vector3<f32>, orientation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// The identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }

    /// A pose at `position` with identity orientation.
    #[must_use]
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Map a point from this pose's local frame into world space.
    #[must_use]
    pub fn transform_point(&self, local: &Vector3<f32>) -> Vector3<f32> {
        self.position + self.orientation * local
    }

    /// Map a world-space point into this pose's local frame.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Vector3<f32>) -> Vector3<f32> {
        self.orientation.inverse_transform_vector(&(world - self.position))
    }

    /// Euclidean distance between this pose's position and another's.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f32 {
        (other.position - self.position).norm()
    }

    /// Rotation angle (radians) between this pose's orientation and another's.
    #[must_use]
    pub fn angle_to(&self, other: &Self) -> f32 {
        self.orientation.angle_to(&other.orientation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
