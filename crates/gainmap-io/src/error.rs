//! Error types for image and container I/O.

use std::io;
use thiserror::Error;

/// Reader or writer failure.
#[derive(Debug, Error)]
pub enum IoError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No reader or writer handles this file.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Bytes do not follow the expected layout.
    #[error("malformed {format} data: {reason}")]
    Malformed {
        /// Format being parsed or written.
        format: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// PNG codec rejected the stream or raster.
    #[error("PNG codec error: {0}")]
    Png(String),

    /// PNG color type or bit depth the pipeline does not handle.
    #[error("unsupported PNG layout: {0}")]
    UnsupportedLayout(String),

    /// Image construction failed.
    #[error(transparent)]
    Core(#[from] gainmap_core::Error),
}

impl IoError {
    /// Malformed Radiance HDR data.
    pub(crate) fn hdr(reason: impl Into<String>) -> Self {
        Self::Malformed {
            format: "Radiance HDR",
            reason: reason.into(),
        }
    }

    /// Malformed gain map container.
    pub(crate) fn container(reason: impl Into<String>) -> Self {
        Self::Malformed {
            format: "gain map container",
            reason: reason.into(),
        }
    }
}

/// Result alias for I/O operations.
pub type IoResult<T> = Result<T, IoError>;
