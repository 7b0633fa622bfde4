//! Per-sample helpers: Rec.709 luminance and the sRGB transfer curve.

/// Red weight of the Rec.709 luma sum.
pub const REC709_LUMA_R: f32 = 0.2126;
/// Green weight of the Rec.709 luma sum.
pub const REC709_LUMA_G: f32 = 0.7152;
/// Blue weight of the Rec.709 luma sum.
pub const REC709_LUMA_B: f32 = 0.0722;

/// `[R, G, B]` weights, the form the engine's luma render takes.
pub const REC709_LUMA: [f32; 3] = [REC709_LUMA_R, REC709_LUMA_G, REC709_LUMA_B];

/// Linear-light luminance of one RGB sample.
///
/// ```
/// use gainmap_core::pixel::luminance_rec709;
/// assert!((luminance_rec709([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
/// ```
#[inline]
pub fn luminance_rec709(rgb: [f32; 3]) -> f32 {
    rgb.iter().zip(REC709_LUMA).map(|(c, w)| c * w).sum()
}

/// sRGB EOTF: decodes sRGB encoded values to linear light.
///
/// ```text
/// if V <= 0.04045: L = V / 12.92
/// else:            L = ((V + 0.055) / 1.055)^2.4
/// ```
#[inline]
pub fn srgb_eotf(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB OETF: encodes linear light to sRGB.
///
/// ```text
/// if L <= 0.0031308: V = L * 12.92
/// else:              V = 1.055 * L^(1/2.4) - 0.055
/// ```
#[inline]
pub fn srgb_oetf(l: f32) -> f32 {
    if l <= 0.0031308 {
        l * 12.92
    } else {
        1.055 * l.powf(1.0 / 2.4) - 0.055
    }
}

/// Quantizes a linear value in [0, 1] to an 8-bit sRGB code.
#[inline]
pub fn linear_to_srgb_u8(l: f32) -> u8 {
    (srgb_oetf(l.clamp(0.0, 1.0)) * 255.0 + 0.5) as u8
}
