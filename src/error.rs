//! Error types for tessel.
//!
//! Only configuration problems surface as errors; contract violations inside
//! the subdivision passes are programming errors and abort via assertions.

use thiserror::Error;

/// Result type alias using [`TerrainError`].
pub type Result<T> = std::result::Result<T, TerrainError>;

/// Errors reported while validating a terrain configuration.
#[derive(Error, Debug)]
pub enum TerrainError {
    /// `level_max` must allow at least one subdivision level.
    #[error("level_max must be at least 1")]
    LevelMaxZero,

    /// A threshold table does not cover every level.
    #[error("{name} has {got} entries, expected {expected}")]
    ThresholdLength {
        /// Which table is malformed.
        name: &'static str,
        /// Entries provided.
        got: usize,
        /// Entries required (`level_max`).
        expected: usize,
    },

    /// Subdivide thresholds must shrink with depth.
    #[error("subdivide thresholds must be strictly decreasing (violated at level {level})")]
    ThresholdNotDecreasing {
        /// The shallower of the two offending levels.
        level: usize,
    },

    /// Every level needs hysteresis between its two thresholds.
    #[error("unsubdivide threshold must exceed subdivide threshold at level {level}")]
    NoHysteresis {
        /// The offending level.
        level: usize,
    },

    /// The planet radius must be positive and representable at the given
    /// fixed-point scale.
    #[error("radius {radius} is not representable at scale {scale}")]
    BadRadius {
        /// Configured radius in meters.
        radius: f64,
        /// Fixed-point scale exponent.
        scale: u32,
    },
}
