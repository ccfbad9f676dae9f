//! Deterministic RNG utilities for reproducible tests.

use nalgebra::{Unit, UnitQuaternion, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Create a deterministic `ChaCha8Rng` from a seed.
///
/// All test randomization should go through this to ensure reproducibility.
#[must_use]
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Uniformly distributed random unit vector (rejection sampled).
#[must_use]
pub fn random_unit_vector(rng: &mut ChaCha8Rng) -> Vector3<f32> {
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0f32..=1.0),
            rng.gen_range(-1.0f32..=1.0),
            rng.gen_range(-1.0f32..=1.0),
        );
        let norm_squared = v.norm_squared();
        if norm_squared > 1e-4 && norm_squared <= 1.0 {
            return v.normalize();
        }
    }
}

/// Random rotation with a uniformly distributed axis and an angle in
/// `(0, pi)`.
#[must_use]
pub fn random_rotation(rng: &mut ChaCha8Rng) -> UnitQuaternion<f32> {
    let axis = Unit::new_normalize(random_unit_vector(rng));
    let angle = rng.gen_range(0.01..std::f32::consts::PI);
    UnitQuaternion::from_axis_angle(&axis, angle)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
