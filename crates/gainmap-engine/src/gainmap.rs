//! Gain map computation.
//!
//! Each gain map sample is the log2 ratio of HDR to SDR luminance at the
//! centre of its footprint, with a small offset on both sides so black
//! pixels stay finite. Samples are normalized to the observed log2 range,
//! which travels with the plane as [`GainMap::min_log2`] and
//! [`GainMap::max_log2`].
//!
//! ```text
//! ratio  = (Y_hdr + 1/64) / (Y_sdr + 1/64)
//! code   = (log2(ratio) - min) / (max - min)
//! ```

use crate::{EngineError, EngineResult};
use gainmap_core::{ColorSpaceId, Error, Image, luminance_rec709};
use gainmap_io::GainMap;
use rayon::prelude::*;

/// Offset added to both luminances before taking the ratio.
pub const GAIN_OFFSET: f32 = 1.0 / 64.0;

/// Smallest log2 range the normalization divides by.
const MIN_LOG_RANGE: f32 = 1e-6;

/// Derives a gain map from an SDR base and its HDR source.
///
/// `scale` downsamples the plane: each gain sample covers a `scale x scale`
/// block of the base.
///
/// # Errors
///
/// Returns a dimension mismatch when the two images differ in extent.
pub fn compute_gain_map(sdr: &Image, hdr: &Image, scale: u32) -> EngineResult<GainMap> {
    if sdr.dimensions() != hdr.dimensions() {
        return Err(Error::dimension_mismatch(sdr.dimensions(), hdr.dimensions()).into());
    }
    let (width, height) = sdr.dimensions();
    let scale = scale.max(1);
    let gm_width = width.div_ceil(scale);
    let gm_height = height.div_ceil(scale);

    let logs: Vec<f32> = (0..gm_width as usize * gm_height as usize)
        .into_par_iter()
        .map(|i| {
            let gx = i as u32 % gm_width;
            let gy = i as u32 / gm_width;
            let sx = (gx * scale + scale / 2).min(width - 1);
            let sy = (gy * scale + scale / 2).min(height - 1);
            log_ratio(sdr.pixel(sx, sy), hdr.pixel(sx, sy))
        })
        .collect();

    let (min_log2, max_log2) = logs
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !min_log2.is_finite() || !max_log2.is_finite() {
        return Err(EngineError::OperationFailed("gain map range is not finite".into()));
    }
    let range = (max_log2 - min_log2).max(MIN_LOG_RANGE);

    let rgb: Vec<f32> = logs
        .par_iter()
        .flat_map_iter(|&v| {
            let code = ((v - min_log2) / range).clamp(0.0, 1.0);
            [code, code, code]
        })
        .collect();
    let image = Image::from_rgb(gm_width, gm_height, &rgb, ColorSpaceId::Unknown)?;

    Ok(GainMap {
        image,
        min_log2,
        max_log2,
    })
}

/// Reconstructs HDR luminance scale from a normalized gain code.
pub fn decode_gain(code: f32, min_log2: f32, max_log2: f32) -> f32 {
    (min_log2 + code.clamp(0.0, 1.0) * (max_log2 - min_log2)).exp2()
}

fn log_ratio(sdr: [f32; 4], hdr: [f32; 4]) -> f32 {
    let y_sdr = luminance_rec709([sdr[0], sdr[1], sdr[2]]).max(0.0);
    let y_hdr = luminance_rec709([hdr[0], hdr[1], hdr[2]]).max(0.0);
    let ratio = (y_hdr + GAIN_OFFSET) / (y_sdr + GAIN_OFFSET);
    if ratio.is_finite() { ratio.log2() } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_gain() {
        let sdr = Image::filled(4, 4, [0.5, 0.5, 0.5, 1.0], ColorSpaceId::Srgb);
        let hdr = Image::filled(4, 4, [2.0, 2.0, 2.0, 1.0], ColorSpaceId::LinearSrgb);
        let gain = compute_gain_map(&sdr, &hdr, 1).unwrap();
        let expected = ((2.0 + GAIN_OFFSET) / (0.5 + GAIN_OFFSET)).log2();
        assert_relative_eq!(gain.min_log2, expected, epsilon = 1e-5);
        assert_relative_eq!(gain.max_log2, expected, epsilon = 1e-5);
        assert_relative_eq!(gain.image.pixel(2, 2)[0], 0.0);
    }

    #[test]
    fn test_range_normalization_and_decode() {
        let rgb_sdr = [0.5f32; 6];
        let rgb_hdr = [0.5, 0.5, 0.5, 4.0, 4.0, 4.0];
        let sdr = Image::from_rgb(2, 1, &rgb_sdr, ColorSpaceId::Srgb).unwrap();
        let hdr = Image::from_rgb(2, 1, &rgb_hdr, ColorSpaceId::LinearSrgb).unwrap();
        let gain = compute_gain_map(&sdr, &hdr, 1).unwrap();

        assert_relative_eq!(gain.min_log2, 0.0, epsilon = 1e-6);
        assert_relative_eq!(gain.image.pixel(0, 0)[0], 0.0);
        assert_relative_eq!(gain.image.pixel(1, 0)[0], 1.0);
        let boost = decode_gain(1.0, gain.min_log2, gain.max_log2);
        assert_relative_eq!(boost, (4.0 + GAIN_OFFSET) / (0.5 + GAIN_OFFSET), epsilon = 1e-4);
    }

    #[test]
    fn test_downscaled_extent() {
        let sdr = Image::filled(9, 5, [0.2; 4], ColorSpaceId::Srgb);
        let hdr = Image::filled(9, 5, [0.8; 4], ColorSpaceId::LinearSrgb);
        let gain = compute_gain_map(&sdr, &hdr, 4).unwrap();
        assert_eq!(gain.image.dimensions(), (3, 2));
    }

    #[test]
    fn test_dimension_mismatch() {
        let sdr = Image::filled(4, 4, [0.2; 4], ColorSpaceId::Srgb);
        let hdr = Image::filled(4, 5, [0.8; 4], ColorSpaceId::LinearSrgb);
        assert!(compute_gain_map(&sdr, &hdr, 1).is_err());
    }
}
