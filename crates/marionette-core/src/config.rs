use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_max_error() -> f32 {
    0.01
}
const fn default_max_iterations() -> u32 {
    100
}
const fn default_times_per_frame() -> f32 {
    1.0
}
const fn default_min_distance() -> f32 {
    1e-5
}
const fn default_search_radius() -> f32 {
    1.0
}
const fn default_ramp_start() -> f32 {
    0.1
}
const fn default_ramp_end() -> f32 {
    1.0
}
const fn default_true() -> bool {
    true
}
const fn default_lock_criteria() -> u32 {
    5
}
const fn default_max_perturbation() -> f32 {
    0.25
}
const fn default_refine_passes() -> u32 {
    2
}
const fn default_rotation_penalty() -> f32 {
    0.1
}
const fn default_back_forth_passes() -> u32 {
    2
}
const fn default_fit_angle_threshold() -> f32 {
    0.01
}
const fn default_residual_power() -> f32 {
    2.0
}
const fn default_parent_damping() -> f32 {
    0.2
}
const fn default_trust_decay() -> f32 {
    0.8
}
const fn default_trust_threshold() -> f32 {
    0.25
}

// ---------------------------------------------------------------------------
// TraversalDirection
// ---------------------------------------------------------------------------

/// Order in which a heuristic visits the joints of a chain each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalDirection {
    /// Base joint first, effector last.
    RootToEffector,
    /// Effector first, base joint last (the classic CCD order).
    #[default]
    EffectorToRoot,
}

// ---------------------------------------------------------------------------
// SolverConfig
// ---------------------------------------------------------------------------

/// Configuration for a single-chain solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Error at or below which the solve counts as converged (default: 0.01).
    #[serde(default = "default_max_error")]
    pub max_error: f32,

    /// Iteration cap per reset (default: 100).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Fractional iteration budget added per `solve()` call (default: 1.0).
    /// A value of 0.5 runs one iteration every other call.
    #[serde(default = "default_times_per_frame")]
    pub times_per_frame: f32,

    /// Length below which vectors are treated as degenerate (default: 1e-5).
    #[serde(default = "default_min_distance")]
    pub min_distance: f32,

    /// Position-error normalization radius (default: 1.0).
    #[serde(default = "default_search_radius")]
    pub search_radius: f32,

    /// Weight of orientation error in the combined error metric
    /// (default: 0.0 = position only).
    #[serde(default)]
    pub orientation_weight: f32,

    /// Whether per-iteration rotation magnitude is ramped (default: true).
    #[serde(default = "default_true")]
    pub ramp_enabled: bool,

    /// Fraction of each proposed rotation allowed at iteration 0
    /// (default: 0.1).
    #[serde(default = "default_ramp_start")]
    pub ramp_start: f32,

    /// Fraction allowed at the final iteration (default: 1.0).
    #[serde(default = "default_ramp_end")]
    pub ramp_end: f32,

    /// Consecutive stagnant iterations before a deadlock escape
    /// (default: 5).
    #[serde(default = "default_lock_criteria")]
    pub lock_criteria: u32,

    /// Maximum per-joint escape rotation in radians (default: 0.25).
    #[serde(default = "default_max_perturbation")]
    pub max_perturbation: f32,

    /// Seed for the escape RNG (default: 0).
    #[serde(default)]
    pub seed: u64,

    /// Joint visiting order (default: effector to root).
    #[serde(default)]
    pub direction: TraversalDirection,

    /// Flip the visiting order on every iteration (default: false).
    #[serde(default)]
    pub alternate_direction: bool,

    /// CCD refinement passes the combined heuristic simulates per candidate
    /// (default: 2).
    #[serde(default = "default_refine_passes")]
    pub refine_passes: u32,

    /// Weight of total applied rotation in the combined heuristic's
    /// candidate score (default: 0.1). Trades smoothness against speed of
    /// convergence; the default mirrors empirical tuning, not a derivation.
    #[serde(default = "default_rotation_penalty")]
    pub rotation_penalty: f32,

    /// Alternating repair passes of the back-and-forth wrapper (default: 2).
    #[serde(default = "default_back_forth_passes")]
    pub back_forth_passes: u32,

    /// Rebuild the working cache from scratch every iteration instead of
    /// updating it incrementally (default: false). Debug aid.
    #[serde(default)]
    pub rebuild_cache_each_iteration: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_error: default_max_error(),
            max_iterations: default_max_iterations(),
            times_per_frame: default_times_per_frame(),
            min_distance: default_min_distance(),
            search_radius: default_search_radius(),
            orientation_weight: 0.0,
            ramp_enabled: true,
            ramp_start: default_ramp_start(),
            ramp_end: default_ramp_end(),
            lock_criteria: default_lock_criteria(),
            max_perturbation: default_max_perturbation(),
            seed: 0,
            direction: TraversalDirection::default(),
            alternate_direction: false,
            refine_passes: default_refine_passes(),
            rotation_penalty: default_rotation_penalty(),
            back_forth_passes: default_back_forth_passes(),
            rebuild_cache_each_iteration: false,
        }
    }
}

impl SolverConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_error.is_finite() || self.max_error <= 0.0 {
            return Err(ConfigError::InvalidMaxError(self.max_error));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ZeroMaxIterations);
        }
        if !self.times_per_frame.is_finite() || self.times_per_frame <= 0.0 {
            return Err(ConfigError::InvalidTimesPerFrame(self.times_per_frame));
        }
        if !self.min_distance.is_finite() || self.min_distance <= 0.0 {
            return Err(invalid("min_distance", "must be finite and > 0"));
        }
        if !self.search_radius.is_finite() || self.search_radius <= 0.0 {
            return Err(invalid("search_radius", "must be finite and > 0"));
        }
        if !self.orientation_weight.is_finite() || self.orientation_weight < 0.0 {
            return Err(invalid("orientation_weight", "must be finite and >= 0"));
        }
        if !(0.0..=1.0).contains(&self.ramp_start) || self.ramp_start == 0.0 {
            return Err(invalid("ramp_start", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.ramp_end) || self.ramp_end < self.ramp_start {
            return Err(invalid("ramp_end", "must be in [ramp_start, 1]"));
        }
        if !self.max_perturbation.is_finite() || self.max_perturbation < 0.0 {
            return Err(invalid("max_perturbation", "must be finite and >= 0"));
        }
        if !self.rotation_penalty.is_finite() || self.rotation_penalty < 0.0 {
            return Err(invalid("rotation_penalty", "must be finite and >= 0"));
        }
        Ok(())
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

// ---------------------------------------------------------------------------
// TreeConfig
// ---------------------------------------------------------------------------

/// Configuration for a whole-skeleton tree solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Configuration handed to every per-segment chain solver. Each segment
    /// derives its own RNG seed from `chain.seed`.
    #[serde(default)]
    pub chain: SolverConfig,

    /// Minimum rotation angle (radians) for a registration fit to be
    /// applied; smaller fits are discarded as jitter (default: 0.01).
    #[serde(default = "default_fit_angle_threshold")]
    pub fit_angle_threshold: f32,

    /// Exponent of the registration residual (default: 2.0 = squared
    /// residuals).
    #[serde(default = "default_residual_power")]
    pub residual_power: f32,

    /// Fraction of the corrective rotation propagated to a segment's parent
    /// (default: 0.2).
    #[serde(default = "default_parent_damping")]
    pub parent_damping: f32,

    /// Multiplicative trust decay applied when aggregate error regresses
    /// (default: 0.8).
    #[serde(default = "default_trust_decay")]
    pub trust_decay: f32,

    /// Trust level below which the tree reverts to its best-seen
    /// configuration (default: 0.25).
    #[serde(default = "default_trust_threshold")]
    pub trust_threshold: f32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            chain: SolverConfig::default(),
            fit_angle_threshold: default_fit_angle_threshold(),
            residual_power: default_residual_power(),
            parent_damping: default_parent_damping(),
            trust_decay: default_trust_decay(),
            trust_threshold: default_trust_threshold(),
        }
    }
}

impl TreeConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()?;
        if !self.fit_angle_threshold.is_finite() || self.fit_angle_threshold < 0.0 {
            return Err(invalid("fit_angle_threshold", "must be finite and >= 0"));
        }
        if !self.residual_power.is_finite() || self.residual_power <= 0.0 {
            return Err(invalid("residual_power", "must be finite and > 0"));
        }
        if !(0.0..=1.0).contains(&self.parent_damping) {
            return Err(invalid("parent_damping", "must be in [0, 1]"));
        }
        if !(0.0..1.0).contains(&self.trust_decay) || self.trust_decay == 0.0 {
            return Err(invalid("trust_decay", "must be in (0, 1)"));
        }
        if !(0.0..1.0).contains(&self.trust_threshold) {
            return Err(invalid("trust_threshold", "must be in [0, 1)"));
        }
        Ok(())
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
