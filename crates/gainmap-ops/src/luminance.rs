//! Linear luminance statistics.
//!
//! Luma is the Rec.709 weighted sum of linear RGB, carried in the red
//! channel of an engine-rendered image. Histograms are taken over luma
//! divided by the image peak so the populated range is `[0, 1]`.

use crate::{OpsError, OpsResult};
use gainmap_core::{Histogram, Image, MAX_HISTOGRAM_BINS, REC709_LUMA};
use gainmap_engine::Engine;
use tracing::trace;

/// Projects `image` onto linear luma with Rec.709 weights.
///
/// Red holds luma, green and blue are zero, alpha is one.
pub fn linear_luma(engine: &dyn Engine, image: &Image) -> Image {
    engine.render_luma(image, REC709_LUMA)
}

/// Peak of a luma image, clamped at zero from below.
///
/// `None` when the engine cannot reduce the image or the peak is not
/// finite.
pub fn max_luminance(engine: &dyn Engine, luma: &Image) -> Option<f64> {
    let max = engine.reduce_max(luma)?[0];
    if max.is_nan() || max == f32::INFINITY {
        return None;
    }
    Some(max.max(0.0) as f64)
}

/// Histogram of `luma / abs_max` with `bin_count` clamped to `[1, 2048]`.
///
/// A peak that is zero or not finite leaves luma unscaled, so a black
/// image puts all of its mass in bin 0.
pub fn histogram(
    engine: &dyn Engine,
    luma: &Image,
    bin_count: usize,
    abs_max: f64,
) -> OpsResult<Histogram> {
    let bins = bin_count.clamp(1, MAX_HISTOGRAM_BINS);
    let scale = if abs_max.is_finite() && abs_max > 0.0 {
        (1.0 / abs_max) as f32
    } else {
        1.0
    };
    let normalized = luma.map_pixels(|p| [p[0] * scale, p[1] * scale, p[2] * scale, p[3]]);
    let masses = engine
        .reduce_histogram(&normalized, bins)
        .ok_or(OpsError::NoOutput("histogram reduction"))?;
    trace!(bins, scale, "luma histogram");
    Ok(Histogram::from_masses(
        masses.iter().map(|m| m[0] as f64).collect(),
    )?)
}

/// Luma image and its peak, measured once per item.
#[derive(Debug, Clone)]
pub struct LuminanceStats {
    luma: Image,
    abs_max: f64,
}

impl LuminanceStats {
    /// Renders luma and reduces its peak.
    ///
    /// # Errors
    ///
    /// [`OpsError::NoOutput`] when the max reduction fails.
    pub fn measure(engine: &dyn Engine, image: &Image) -> OpsResult<Self> {
        let luma = linear_luma(engine, image);
        let abs_max = max_luminance(engine, &luma).ok_or(OpsError::NoOutput("max reduction"))?;
        Ok(Self { luma, abs_max })
    }

    /// Luma image.
    pub fn luma(&self) -> &Image {
        &self.luma
    }

    /// Peak linear luminance.
    pub fn abs_max(&self) -> f64 {
        self.abs_max
    }

    /// Histogram normalized by the peak.
    pub fn histogram(&self, engine: &dyn Engine, bin_count: usize) -> OpsResult<Histogram> {
        histogram(engine, &self.luma, bin_count, self.abs_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gainmap_core::ColorSpaceId;
    use gainmap_engine::CpuEngine;

    #[test]
    fn test_linear_luma_weights() {
        let engine = CpuEngine::new();
        let img = Image::filled(2, 2, [1.0, 1.0, 1.0, 0.5], ColorSpaceId::LinearSrgb);
        let luma = linear_luma(&engine, &img);
        assert_relative_eq!(luma.pixel(0, 0)[0], 1.0, epsilon = 1e-6);
        assert_eq!(&luma.pixel(0, 0)[1..], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_zero_image() {
        let engine = CpuEngine::new();
        let img = Image::filled(8, 8, [0.0, 0.0, 0.0, 1.0], ColorSpaceId::LinearSrgb);
        let stats = LuminanceStats::measure(&engine, &img).unwrap();
        assert_eq!(stats.abs_max(), 0.0);

        let hist = stats.histogram(&engine, 16).unwrap();
        assert_relative_eq!(hist.mass(0), hist.total());
        assert!(hist.total() > 0.0);
    }

    #[test]
    fn test_histogram_normalized_by_peak() {
        let engine = CpuEngine::new();
        let rgb = [0.0, 0.0, 0.0, 4.0, 4.0, 4.0];
        let img = Image::from_rgb(2, 1, &rgb, ColorSpaceId::LinearSrgb).unwrap();
        let stats = LuminanceStats::measure(&engine, &img).unwrap();
        assert_relative_eq!(stats.abs_max(), 4.0, epsilon = 1e-5);

        let hist = stats.histogram(&engine, 4).unwrap();
        assert_relative_eq!(hist.mass(0), 0.5);
        assert_relative_eq!(hist.mass(3), 0.5);
    }

    #[test]
    fn test_bin_count_clamped() {
        let engine = CpuEngine::new();
        let img = Image::filled(2, 2, [0.5; 4], ColorSpaceId::LinearSrgb);
        let luma = linear_luma(&engine, &img);
        assert_eq!(histogram(&engine, &luma, 0, 1.0).unwrap().bin_count(), 1);
        assert_eq!(
            histogram(&engine, &luma, 10_000, 1.0).unwrap().bin_count(),
            MAX_HISTOGRAM_BINS
        );
    }

    #[test]
    fn test_max_failure_reported() {
        let engine = CpuEngine::new().with_max_extent(1);
        let img = Image::filled(2, 2, [0.5; 4], ColorSpaceId::LinearSrgb);
        let err = LuminanceStats::measure(&engine, &img).unwrap_err();
        assert!(matches!(err, OpsError::NoOutput(_)));
    }
}
