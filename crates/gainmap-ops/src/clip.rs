//! Clip analysis.
//!
//! Estimates how much of an image sits above a headroom threshold and
//! renders a mask and overlay of those pixels for diagnostics.

use crate::OpsResult;
use gainmap_core::{Histogram, Image, luminance_rec709};
use tracing::trace;

/// Gain applied to `luma - threshold` before clamping the mask to `[0, 1]`.
pub const CLIP_MASK_GAIN: f32 = 1.0e6;

/// Default overlay colour (opaque red).
pub const OVERLAY_RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

/// Share of pixels above a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipStats {
    /// Fraction in `[0, 1]`.
    pub fraction: f64,
    /// `fraction * total_pixel_count`, rounded.
    pub clipped_pixel_count: u64,
    /// Pixels the fraction refers to.
    pub total_pixel_count: u64,
}

/// Pixel count for clip statistics.
///
/// Declared dimensions in the metadata win over the rendered extent.
pub fn pixel_count(image: &Image) -> u64 {
    image
        .metadata()
        .declared_dimensions()
        .map(|(w, h)| w as u64 * h as u64)
        .unwrap_or_else(|| image.pixel_count())
}

/// Fraction of histogram mass above `threshold`.
///
/// `hist` covers luma normalized by `abs_max`. Mass inside the bin holding
/// the threshold is interpolated linearly, so the estimate moves smoothly
/// as the threshold crosses a bin.
pub fn fraction_above(
    hist: &Histogram,
    abs_max: f64,
    threshold: f64,
    total_pixel_count: u64,
) -> ClipStats {
    let total = hist.total();
    if !(abs_max.is_finite() && abs_max > 0.0) || total <= 0.0 || threshold.is_nan() {
        return ClipStats {
            fraction: 0.0,
            clipped_pixel_count: 0,
            total_pixel_count,
        };
    }

    let thr_norm = (threshold / abs_max).clamp(0.0, 1.0);
    let thr_bin = hist.bin_of(thr_norm);
    let above_strict: f64 = hist.masses()[thr_bin + 1..].iter().sum();
    let frac_in_bin = ((hist.bin_upper(thr_bin) - thr_norm) / hist.bin_width()).clamp(0.0, 1.0);
    let fraction = ((above_strict + hist.mass(thr_bin) * frac_in_bin) / total).clamp(0.0, 1.0);

    trace!(threshold, thr_norm, thr_bin, fraction, "clip fraction");
    ClipStats {
        fraction,
        clipped_pixel_count: (fraction * total_pixel_count as f64).round() as u64,
        total_pixel_count,
    }
}

/// Binary mask of pixels whose linear luma exceeds `threshold`.
///
/// Mask values are replicated across RGB; alpha is one.
pub fn build_clip_mask(image: &Image, threshold: f32) -> Image {
    image.map_pixels(|p| {
        let l = luminance_rec709([p[0], p[1], p[2]]);
        // f32::max maps NaN luma to 0
        let m = ((l - threshold).max(0.0) * CLIP_MASK_GAIN).clamp(0.0, 1.0);
        [m, m, m, 1.0]
    })
}

/// Blends `color` over `base` weighted by `mask`.
///
/// White mask pixels take `color`, black ones keep `base`.
///
/// # Errors
///
/// Dimension mismatch between `base` and `mask`.
pub fn apply_mask_overlay(base: &Image, mask: &Image, color: [f32; 4]) -> OpsResult<Image> {
    Ok(base.zip_map(mask, |b, m| {
        let w = m[0].clamp(0.0, 1.0) * color[3];
        [
            b[0] + (color[0] - b[0]) * w,
            b[1] + (color[1] - b[1]) * w,
            b[2] + (color[2] - b[2]) * w,
            b[3],
        ]
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gainmap_core::metadata::keys;
    use gainmap_core::{AttrValue, ColorSpaceId};

    fn one_bin(bins: usize, at: usize) -> Histogram {
        let mut masses = vec![0.0; bins];
        masses[at] = 100.0;
        Histogram::from_masses(masses).unwrap()
    }

    #[test]
    fn test_all_mass_in_bottom_bin() {
        let hist = one_bin(256, 0);
        let stats = fraction_above(&hist, 4.0, 1.0, 1000);
        assert_eq!(stats.fraction, 0.0);
        assert_eq!(stats.clipped_pixel_count, 0);
    }

    #[test]
    fn test_all_mass_in_top_bin_zero_threshold() {
        let hist = one_bin(256, 255);
        let stats = fraction_above(&hist, 4.0, 0.0, 1000);
        assert_relative_eq!(stats.fraction, 1.0);
        assert_eq!(stats.clipped_pixel_count, 1000);
    }

    #[test]
    fn test_sub_bin_interpolation() {
        let hist = Histogram::from_masses(vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        // threshold at 0.375 of the range: half of bin 1 plus bins 2 and 3
        let stats = fraction_above(&hist, 8.0, 3.0, 4);
        assert_relative_eq!(stats.fraction, 2.5 / 4.0, epsilon = 1e-12);
        assert_eq!(stats.clipped_pixel_count, 3);
    }

    #[test]
    fn test_fraction_is_continuous() {
        let hist = Histogram::from_masses((1..=64).map(|i| i as f64).collect()).unwrap();
        let mut prev = fraction_above(&hist, 1.0, 0.0, 1).fraction;
        for i in 1..=1000 {
            let f = fraction_above(&hist, 1.0, i as f64 / 1000.0, 1).fraction;
            assert!(f <= prev + 1e-12);
            assert!(prev - f < 0.01);
            prev = f;
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        let hist = one_bin(16, 15);
        assert_eq!(fraction_above(&hist, 0.0, 1.0, 10).fraction, 0.0);
        let empty = Histogram::from_masses(vec![0.0; 16]).unwrap();
        assert_eq!(fraction_above(&empty, 2.0, 1.0, 10).fraction, 0.0);
    }

    #[test]
    fn test_pixel_count_prefers_metadata() {
        let img = Image::filled(4, 4, [0.0; 4], ColorSpaceId::LinearSrgb);
        assert_eq!(pixel_count(&img), 16);
        let tagged = img
            .with_attr(keys::IMAGE_WIDTH, AttrValue::UInt(40))
            .with_attr(keys::IMAGE_HEIGHT, AttrValue::UInt(30));
        assert_eq!(pixel_count(&tagged), 1200);
    }

    #[test]
    fn test_mask_and_overlay() {
        let rgb = [0.5, 0.5, 0.5, 3.0, 3.0, 3.0];
        let img = Image::from_rgb(2, 1, &rgb, ColorSpaceId::LinearSrgb).unwrap();
        let mask = build_clip_mask(&img, 1.0);
        assert_eq!(mask.pixel(0, 0), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(mask.pixel(1, 0), [1.0, 1.0, 1.0, 1.0]);

        let overlay = apply_mask_overlay(&img, &mask, OVERLAY_RED).unwrap();
        assert_eq!(overlay.pixel(0, 0), img.pixel(0, 0));
        assert_eq!(overlay.pixel(1, 0), [1.0, 0.0, 0.0, 1.0]);
    }
}
