//! Shared test helpers: deterministic RNG and canned skeleton fixtures.

pub mod fixtures;
pub mod rng;

pub use fixtures::{hinged_skeleton, straight_skeleton, y_skeleton};
pub use rng::{random_rotation, random_unit_vector, seeded_rng};
