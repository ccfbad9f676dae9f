use thiserror::Error;

/// Top-level error type for the marionette workspace.
#[derive(Debug, Error)]
pub enum MarionetteError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid max_error: {0} (must be finite and > 0)")]
    InvalidMaxError(f32),

    #[error("Invalid max_iterations: 0 (must be >= 1)")]
    ZeroMaxIterations,

    #[error("Invalid times_per_frame: {0} (must be finite and > 0)")]
    InvalidTimesPerFrame(f32),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Chain and skeleton structure errors.
///
/// Copy + static messages for cheap propagation in hot paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Chain is empty")]
    Empty,

    #[error("Effector index out of range: {index} >= {len}")]
    EffectorOutOfRange { index: usize, len: usize },

    #[error("Bone index out of range: {index} >= {len}")]
    BoneOutOfRange { index: usize, len: usize },

    #[error("Bones {first} and {second} are not a parent/child pair")]
    NotConsecutive { first: usize, second: usize },

    #[error("Bone list length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Bone {descendant} is not a descendant of bone {ancestor}")]
    NotReachable { ancestor: usize, descendant: usize },

    #[error("Bone {bone} cannot carry a target (not a segment end of the solver tree)")]
    NotATargetBone { bone: usize },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
