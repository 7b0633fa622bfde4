//! # gainmap-io
//!
//! Image I/O for the gain map converter.
//!
//! - **HDR** - Radiance RGBE input (flat and RLE scanlines)
//! - **PNG** - SDR pairs and diagnostic overlays, 8/16-bit
//! - **GMAP** - Gain map container: SDR base, gain map plane, typed attributes
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use gainmap_io::{read, container};
//!
//! let hdr = read("scene.hdr")?;
//! let gain = container::read_gain_map("scene.gmap")?;
//! ```
//!
//! # Supported Formats
//!
//! | Format | Read | Write | Notes |
//! |--------|------|-------|-------|
//! | HDR | Yes | Yes | RGBE/XYZE, orientation from resolution line |
//! | PNG | Yes | Yes | sRGB decode to linear on read |
//! | GMAP | Yes | Yes | Legacy (8-bit) and 10-bit gain map planes |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod container;
mod detect;
mod error;
pub mod hdr;
pub mod png;

pub use container::{EncoderStrategy, GainMap, GainMapContainer};
pub use detect::Format;
pub use error::{IoError, IoResult};

use gainmap_core::Image;
use std::path::Path;
use tracing::debug;

/// Reads an image, detecting the format from magic bytes or extension.
///
/// Containers yield their SDR base image.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    let path = path.as_ref();
    let format = Format::detect(path)?;
    debug!(path = %path.display(), ?format, "reading image");
    match format {
        Format::Hdr => hdr::read(path),
        Format::Png => png::read(path),
        Format::GainMap => Ok(container::read(path)?.base),
        Format::Unknown => Err(IoError::UnsupportedFormat(path.display().to_string())),
    }
}

/// Writes an image; the format follows the extension (`.hdr` or `.png`).
pub fn write<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    let path = path.as_ref();
    match Format::from_extension(path) {
        Format::Hdr => hdr::write(path, image),
        Format::Png => png::write(path, image),
        other => Err(IoError::UnsupportedFormat(format!(
            "cannot write {:?} to {}",
            other,
            path.display()
        ))),
    }
}
