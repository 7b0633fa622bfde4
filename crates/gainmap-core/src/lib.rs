//! # gainmap-core
//!
//! Core types for HDR to SDR + gain map conversion.
//!
//! This crate provides the foundational types used throughout the workspace:
//!
//! - [`Image`] - Immutable RGBA f32 buffer tagged with color space and orientation
//! - [`ColorSpaceId`] - Runtime color space tag used for input preconditions
//! - [`Orientation`] - EXIF orientation of stored pixels
//! - [`Attrs`], [`AttrValue`] - Typed metadata attributes attached to images
//! - [`Histogram`] - Normalized luminance histogram with CDF helpers
//!
//! ## Crate Structure
//!
//! ```text
//! gainmap-core (this crate)
//!    ^
//!    |
//!    +-- gainmap-io (HDR/PNG/container codecs)
//!    +-- gainmap-engine (rendering primitives)
//!    +-- gainmap-ops (headroom, maker metadata, clip analysis)
//!    +-- gainmap-pipeline (per-item pipeline and batch driver)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod colorspace;
pub mod error;
pub mod histogram;
pub mod image;
pub mod metadata;
pub mod orientation;
pub mod pixel;

pub use colorspace::ColorSpaceId;
pub use error::{Error, Result};
pub use histogram::{Histogram, MAX_HISTOGRAM_BINS};
pub use image::Image;
pub use metadata::{AttrValue, Attrs};
pub use orientation::Orientation;
pub use pixel::{luminance_rec709, REC709_LUMA, REC709_LUMA_B, REC709_LUMA_G, REC709_LUMA_R};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::colorspace::ColorSpaceId;
    pub use crate::error::{Error, Result};
    pub use crate::histogram::Histogram;
    pub use crate::image::Image;
    pub use crate::metadata::{AttrValue, Attrs};
    pub use crate::orientation::Orientation;
}
