//! Error taxonomy for map construction, sampling and persistence.

use thiserror::Error;

/// Errors raised by the harmonic planner core.
///
/// Non-convergence is deliberately absent: the solver reports it through
/// [`crate::SolveReport`] instead of failing.
#[derive(Error, Debug)]
pub enum HarmonicError {
    /// Malformed or degenerate map (zero area, no goal, no free region).
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// Sampler queried outside the grid extent.
    #[error("point ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: f64,
        y: f64,
        width: usize,
        height: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarmonicError>;
