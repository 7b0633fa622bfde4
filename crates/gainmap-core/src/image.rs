//! Image buffer type.
//!
//! [`Image`] is an immutable RGBA f32 raster tagged with a color space,
//! an orientation and a metadata attribute map. Transformations return new
//! images; the pixel buffer lives behind an [`Arc`] so clones and
//! re-tagging are cheap.
//!
//! # Memory Layout
//!
//! Pixels are stored in **row-major** order, top-to-bottom, always with four
//! interleaved channels:
//!
//! ```text
//! Memory: [R G B A R G B A ...]  <- Row 0
//!         [R G B A R G B A ...]  <- Row 1
//! ```
//!
//! # Usage
//!
//! ```rust
//! use gainmap_core::{ColorSpaceId, Image};
//!
//! let img = Image::filled(4, 2, [2.0, 1.0, 0.5, 1.0], ColorSpaceId::LinearSrgb);
//! assert_eq!(img.pixel(3, 1), [2.0, 1.0, 0.5, 1.0]);
//!
//! let halved = img.map_pixels(|p| [p[0] * 0.5, p[1] * 0.5, p[2] * 0.5, p[3]]);
//! assert_eq!(halved.pixel(0, 0)[0], 1.0);
//! ```

use crate::{AttrValue, Attrs, ColorSpaceId, Error, Orientation, Result};
use rayon::prelude::*;
use std::sync::Arc;

/// Number of interleaved channels in every [`Image`].
pub const CHANNELS: usize = 4;

/// Immutable RGBA f32 image.
#[derive(Clone)]
pub struct Image {
    data: Arc<Vec<f32>>,
    width: u32,
    height: u32,
    color_space: ColorSpaceId,
    orientation: Orientation,
    metadata: Attrs,
}

impl Image {
    /// Wraps an interleaved RGBA buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] for a zero extent and
    /// [`Error::BufferSize`] when the buffer length does not match.
    pub fn from_rgba(
        width: u32,
        height: u32,
        data: Vec<f32>,
        color_space: ColorSpaceId,
    ) -> Result<Self> {
        let expected = checked_len(width, height)?;
        if data.len() != expected {
            return Err(Error::BufferSize {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data: Arc::new(data),
            width,
            height,
            color_space,
            orientation: Orientation::Normal,
            metadata: Attrs::new(),
        })
    }

    /// Builds an image from an interleaved RGB buffer, setting alpha to 1.
    pub fn from_rgb(
        width: u32,
        height: u32,
        rgb: &[f32],
        color_space: ColorSpaceId,
    ) -> Result<Self> {
        let pixels = checked_len(width, height)? / CHANNELS;
        if rgb.len() != pixels * 3 {
            return Err(Error::BufferSize {
                expected: pixels * 3,
                got: rgb.len(),
            });
        }
        let data = rgb
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 1.0])
            .collect();
        Self::from_rgba(width, height, data, color_space)
    }

    /// Creates an image where every pixel has the same value.
    ///
    /// Zero dimensions are clamped to 1.
    pub fn filled(width: u32, height: u32, pixel: [f32; 4], color_space: ColorSpaceId) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let count = width as usize * height as usize;
        let data = pixel.iter().copied().cycle().take(count * CHANNELS).collect();
        Self {
            data: Arc::new(data),
            width,
            height,
            color_space,
            orientation: Orientation::Normal,
            metadata: Attrs::new(),
        }
    }

    /// Image width in pixels (stored orientation).
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels (stored orientation).
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)` in stored orientation.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Width and height after applying the orientation.
    pub fn display_dimensions(&self) -> (u32, u32) {
        self.orientation.display_dimensions(self.width, self.height)
    }

    /// Total number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Color space tag.
    #[inline]
    pub fn color_space(&self) -> ColorSpaceId {
        self.color_space
    }

    /// Orientation of the stored pixels.
    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Metadata attributes.
    #[inline]
    pub fn metadata(&self) -> &Attrs {
        &self.metadata
    }

    /// Raw interleaved RGBA samples.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Same pixels with a different color space tag.
    pub fn with_color_space(&self, color_space: ColorSpaceId) -> Self {
        Self {
            color_space,
            ..self.clone()
        }
    }

    /// Same pixels with a different orientation.
    pub fn with_orientation(&self, orientation: Orientation) -> Self {
        Self {
            orientation,
            ..self.clone()
        }
    }

    /// Same pixels with the given metadata replacing the current map.
    pub fn with_metadata(&self, metadata: Attrs) -> Self {
        Self {
            metadata,
            ..self.clone()
        }
    }

    /// Same pixels with one attribute added or replaced.
    pub fn with_attr(&self, key: impl Into<String>, value: AttrValue) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.set(key, value);
        self.with_metadata(metadata)
    }

    /// Applies `f` to every pixel in parallel, returning a new image.
    ///
    /// Tags, orientation and metadata carry over.
    pub fn map_pixels<F>(&self, f: F) -> Self
    where
        F: Fn([f32; 4]) -> [f32; 4] + Sync + Send,
    {
        let mut out = vec![0.0f32; self.data.len()];
        out.par_chunks_exact_mut(CHANNELS)
            .zip(self.data.par_chunks_exact(CHANNELS))
            .for_each(|(dst, src)| {
                let px = f([src[0], src[1], src[2], src[3]]);
                dst.copy_from_slice(&px);
            });
        Self {
            data: Arc::new(out),
            ..self.clone()
        }
    }

    /// Combines two same-sized images pixel by pixel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when extents differ.
    pub fn zip_map<F>(&self, other: &Image, f: F) -> Result<Self>
    where
        F: Fn([f32; 4], [f32; 4]) -> [f32; 4] + Sync + Send,
    {
        if self.dimensions() != other.dimensions() {
            return Err(Error::dimension_mismatch(self.dimensions(), other.dimensions()));
        }
        let mut out = vec![0.0f32; self.data.len()];
        out.par_chunks_exact_mut(CHANNELS)
            .zip(self.data.par_chunks_exact(CHANNELS))
            .zip(other.data.par_chunks_exact(CHANNELS))
            .for_each(|((dst, a), b)| {
                let px = f([a[0], a[1], a[2], a[3]], [b[0], b[1], b[2], b[3]]);
                dst.copy_from_slice(&px);
            });
        Ok(Self {
            data: Arc::new(out),
            ..self.clone()
        })
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("color_space", &self.color_space)
            .field("orientation", &self.orientation)
            .field("attrs", &self.metadata.len())
            .finish()
    }
}

fn checked_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_dimensions(width, height, "zero extent"));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or_else(|| Error::invalid_dimensions(width, height, "buffer size overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_sets_alpha() {
        let img = Image::from_rgb(2, 1, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], ColorSpaceId::LinearSrgb)
            .unwrap();
        assert_eq!(img.pixel(0, 0), [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(img.pixel(1, 0), [4.0, 5.0, 6.0, 1.0]);
        assert_eq!(img.pixel_count(), 2);
    }

    #[test]
    fn test_buffer_size_checked() {
        let err = Image::from_rgba(2, 2, vec![0.0; 15], ColorSpaceId::Srgb).unwrap_err();
        assert!(matches!(err, Error::BufferSize { expected: 16, got: 15 }));
        assert!(Image::from_rgba(0, 2, vec![], ColorSpaceId::Srgb).is_err());
    }

    #[test]
    fn test_map_pixels_is_pure() {
        let img = Image::filled(3, 3, [0.5, 0.5, 0.5, 1.0], ColorSpaceId::LinearSrgb);
        let doubled = img.map_pixels(|p| [p[0] * 2.0, p[1] * 2.0, p[2] * 2.0, p[3]]);
        assert_eq!(img.pixel(1, 1), [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(doubled.pixel(1, 1), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(doubled.color_space(), ColorSpaceId::LinearSrgb);
    }

    #[test]
    fn test_zip_map_dimension_mismatch() {
        let a = Image::filled(2, 2, [0.0; 4], ColorSpaceId::LinearSrgb);
        let b = Image::filled(3, 2, [0.0; 4], ColorSpaceId::LinearSrgb);
        assert!(a.zip_map(&b, |x, _| x).is_err());
    }

    #[test]
    fn test_orientation_and_attrs() {
        let img = Image::filled(4, 2, [0.0; 4], ColorSpaceId::Srgb)
            .with_orientation(Orientation::Rotate90)
            .with_attr("Software", AttrValue::Str("test".into()));
        assert_eq!(img.display_dimensions(), (2, 4));
        assert_eq!(img.metadata().get("Software").and_then(|v| v.as_str()), Some("test"));
    }
}
