//! Error types for the conversion pipeline.
//!
//! [`PipelineError`] aborts a whole run before any item starts.
//! [`ItemError`] ends one item and is recorded in the run statistics.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal run-level error.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input directory does not exist.
    #[error("input directory not found: {0}")]
    InputDirMissing(PathBuf),

    /// Output directory cannot be created or written.
    #[error("output directory not writable: {path}: {source}")]
    OutputDirUnwritable {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Option out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Config file could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for [`crate::PipelineConfig`].
    #[error("cannot parse config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Worker pool could not be built.
    #[error("cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for run-level operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Why one item did not produce output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// Precondition violated before any computation.
    Skipped(String),
    /// Computation or I/O failed.
    Failed(String),
}

impl ItemError {
    /// Skipped with a reason.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    /// Failed with a reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Human-readable reason.
    pub fn reason(&self) -> &str {
        match self {
            Self::Skipped(r) | Self::Failed(r) => r,
        }
    }

    /// Whether this is a skip.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(r) => write!(f, "skipped: {r}"),
            Self::Failed(r) => write!(f, "failed: {r}"),
        }
    }
}

impl std::error::Error for ItemError {}

impl From<gainmap_ops::OpsError> for ItemError {
    fn from(e: gainmap_ops::OpsError) -> Self {
        Self::Failed(e.to_string())
    }
}

impl From<gainmap_engine::EngineError> for ItemError {
    fn from(e: gainmap_engine::EngineError) -> Self {
        Self::Failed(e.to_string())
    }
}

impl From<gainmap_io::IoError> for ItemError {
    fn from(e: gainmap_io::IoError) -> Self {
        Self::Failed(e.to_string())
    }
}
