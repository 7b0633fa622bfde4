//! Extended Reinhard tone mapping on luminance.
//!
//! ```text
//! w     = source_headroom / target_headroom
//! x     = Y / target_headroom
//! Y'    = target_headroom * x * (1 + x / w^2) / (1 + x)
//! RGB'  = RGB * Y' / Y
//! ```
//!
//! Luminance equal to the source headroom maps exactly to the target
//! headroom; hue is preserved by scaling all channels by the same factor.

use gainmap_core::{ColorSpaceId, Image, luminance_rec709};

/// Extended Reinhard curve with white point `white`.
#[inline]
pub fn reinhard_extended(x: f32, white: f32) -> f32 {
    x * (1.0 + x / (white * white)) / (1.0 + x)
}

/// Tone maps `hdr` from `source_headroom` down to `target_headroom`.
///
/// Output is tagged [`ColorSpaceId::Srgb`] and clamped to
/// `[0, target_headroom]`. When the source has no headroom above the target
/// the image is only clamped.
pub fn extended_reinhard(hdr: &Image, source_headroom: f32, target_headroom: f32) -> Image {
    let target = if target_headroom.is_finite() && target_headroom > 0.0 {
        target_headroom
    } else {
        1.0
    };
    let white = source_headroom / target;

    let out = if !white.is_finite() || white <= 1.0 {
        hdr.map_pixels(|p| {
            [
                clamp_channel(p[0], target),
                clamp_channel(p[1], target),
                clamp_channel(p[2], target),
                p[3],
            ]
        })
    } else {
        hdr.map_pixels(|p| {
            let y = luminance_rec709([p[0], p[1], p[2]]);
            if y.is_nan() || y <= 0.0 {
                return [0.0, 0.0, 0.0, p[3]];
            }
            let mapped = target * reinhard_extended(y / target, white);
            let k = mapped / y;
            [
                clamp_channel(p[0] * k, target),
                clamp_channel(p[1] * k, target),
                clamp_channel(p[2] * k, target),
                p[3],
            ]
        })
    };
    out.with_color_space(ColorSpaceId::Srgb)
}

#[inline]
fn clamp_channel(v: f32, max: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, max) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_white_point_maps_to_one() {
        assert_relative_eq!(reinhard_extended(4.0, 4.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(reinhard_extended(0.0, 4.0), 0.0);
    }

    #[test]
    fn test_curve_is_monotonic() {
        let mut prev = 0.0;
        for i in 1..=100 {
            let v = reinhard_extended(i as f32 * 0.04, 4.0);
            assert!(v > prev);
            prev = v;
        }
    }

    #[test]
    fn test_tone_map_peak() {
        let hdr = Image::filled(2, 2, [4.0, 4.0, 4.0, 1.0], ColorSpaceId::LinearSrgb);
        let sdr = extended_reinhard(&hdr, 4.0, 1.0);
        assert_eq!(sdr.color_space(), ColorSpaceId::Srgb);
        assert_relative_eq!(sdr.pixel(0, 0)[1], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_no_headroom_only_clamps() {
        let hdr = Image::filled(1, 1, [0.25, 1.5, f32::NAN, 1.0], ColorSpaceId::LinearSrgb);
        let sdr = extended_reinhard(&hdr, 1.0, 1.0);
        assert_eq!(sdr.pixel(0, 0), [0.25, 1.0, 0.0, 1.0]);
    }
}
