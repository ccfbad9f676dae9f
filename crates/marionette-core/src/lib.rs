// marionette-core: Types, constraints, config, seeds and errors for the marionette IK solver.

pub mod config;
pub mod constraint;
pub mod error;
pub mod math;
pub mod seed;
pub mod skeleton;
pub mod types;

pub use config::{SolverConfig, TraversalDirection, TreeConfig};
pub use constraint::{BallSocket, Constraint, Hinge, PolygonCone};
pub use error::{ChainError, ConfigError, MarionetteError};
pub use skeleton::{Bone, Skeleton};
pub use types::Pose;
