//! Error types for luminance and metadata operations.

use crate::maker::ValidationDiffs;
use thiserror::Error;

/// Error type for luminance and metadata operations.
#[derive(Error, Debug)]
pub enum OpsError {
    /// An engine primitive produced no output.
    #[error("engine produced no output for {0}")]
    NoOutput(&'static str),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No maker metadata branch accepts the headroom.
    #[error("no maker metadata candidate for headroom {headroom}")]
    NoCandidate {
        /// Clamped linear headroom.
        headroom: f64,
    },

    /// Forward mapping of the chosen candidate drifted past tolerance.
    #[error("maker metadata failed validation: {diffs}")]
    ValidationFailed {
        /// Round-trip differences.
        diffs: ValidationDiffs,
    },

    /// Image construction or combination failed.
    #[error(transparent)]
    Core(#[from] gainmap_core::Error),
}

/// Result type for luminance and metadata operations.
pub type OpsResult<T> = Result<T, OpsError>;
