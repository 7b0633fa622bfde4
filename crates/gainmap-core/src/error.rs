//! Error types for gainmap-core operations.
//!
//! The [`Error`] enum covers failure modes of image construction and
//! histogram handling. Higher crates wrap it in their own error types.
//!
//! # Usage
//!
//! ```rust
//! use gainmap_core::{Error, Result};
//!
//! fn check(width: u32, height: u32) -> Result<()> {
//!     if width == 0 || height == 0 {
//!         return Err(Error::invalid_dimensions(width, height, "zero extent"));
//!     }
//!     Ok(())
//! }
//! assert!(check(0, 4).is_err());
//! ```

use thiserror::Error;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to build or combine core values.
#[derive(Debug, Error)]
pub enum Error {
    /// Zero extent, or an extent whose buffer size overflows.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// What was wrong with them
        reason: String,
    },

    /// Two images that must share an extent do not.
    #[error("extent mismatch: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        /// Left operand width
        left_width: u32,
        /// Left operand height
        left_height: u32,
        /// Right operand width
        right_width: u32,
        /// Right operand height
        right_height: u32,
    },

    /// Pixel buffer length does not match `width * height * channels`.
    #[error("buffer holds {got} samples, expected {expected}")]
    BufferSize {
        /// Expected sample count
        expected: usize,
        /// Actual sample count
        got: usize,
    },

    /// Histogram bin count outside `1..=MAX_HISTOGRAM_BINS`.
    #[error("histogram bin count {0} out of range")]
    InvalidBinCount(usize),
}

impl Error {
    /// [`Error::InvalidDimensions`] with a reason.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// [`Error::DimensionMismatch`] from two `(width, height)` pairs.
    #[inline]
    pub fn dimension_mismatch(left: (u32, u32), right: (u32, u32)) -> Self {
        Self::DimensionMismatch {
            left_width: left.0,
            left_height: left.1,
            right_width: right.0,
            right_height: right.1,
        }
    }

    /// Extent-related failure (as opposed to a histogram one).
    #[inline]
    pub fn is_dimension_error(&self) -> bool {
        !matches!(self, Self::InvalidBinCount(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message() {
        let err = Error::dimension_mismatch((100, 100), (200, 50));
        assert_eq!(err.to_string(), "extent mismatch: 100x100 vs 200x50");
        assert!(err.is_dimension_error());
    }

    #[test]
    fn test_bin_count_is_not_dimensional() {
        let err = Error::InvalidBinCount(4096);
        assert!(!err.is_dimension_error());
        assert!(err.to_string().contains("4096"));
    }
}
