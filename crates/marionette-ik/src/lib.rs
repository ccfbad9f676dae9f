//! Heuristic inverse kinematics for articulated chains and trees.
//!
//! # Architecture
//!
//! ```text
//! Skeleton ──► TreeSolver ──► ChainSolver (per segment)
//!                                  │
//!                                  ▼
//!                              Context ◄──► Heuristic (CCD, TIK, TRIK, ...)
//!                                  │
//!                                  ▼
//!                            TransformCache
//! ```
//!
//! A [`ChainSolver`] drives one kinematic chain toward a target pose by
//! repeatedly applying a pluggable geometric [`Heuristic`] to a speculative
//! working copy of the chain, committing an iteration's result only when it
//! improves on the best configuration seen so far. A [`TreeSolver`]
//! decomposes a branching [`Skeleton`](marionette_core::Skeleton) into chain
//! segments, solves them leaves-first, and coordinates multi-target subtrees
//! through closed-form rigid registration.
//!
//! Everything is synchronous, single-threaded and deterministic: identical
//! inputs and seeds produce identical joint configurations.

pub mod cache;
pub mod chain;
pub mod chain_solver;
pub mod context;
pub mod heuristics;
pub mod registration;
pub mod tree_solver;

pub use chain::{Chain, Joint};
pub use chain_solver::{ChainSolver, SolverState};
pub use context::Context;
pub use heuristics::{Heuristic, HeuristicKind};
pub use tree_solver::TreeSolver;
