//! Color space tags carried by images.
//!
//! Images in this workspace always hold linear-light samples. The
//! [`ColorSpaceId`] tag records the primaries and the transfer function the
//! source file was encoded with, so the pipeline can check input
//! preconditions (HDR input must come from an HDR-capable encoding, a paired
//! SDR image must come from a display-referred SDR encoding).
//!
//! # Supported Tags
//!
//! ## Scene-Referred (Linear)
//! - [`ColorSpaceId::LinearSrgb`] - Rec.709 primaries, linear
//! - [`ColorSpaceId::LinearDisplayP3`] - P3 primaries (D65), linear
//! - [`ColorSpaceId::LinearRec2020`] - Rec.2020 primaries, linear
//!
//! ## HDR Display Encodings
//! - [`ColorSpaceId::Rec2100Pq`] - Rec.2020 primaries, SMPTE ST 2084
//! - [`ColorSpaceId::Rec2100Hlg`] - Rec.2020 primaries, ARIB STD-B67
//!
//! ## SDR Display Encodings
//! - [`ColorSpaceId::Srgb`] - sRGB transfer
//! - [`ColorSpaceId::DisplayP3`] - P3 primaries, sRGB transfer
//!
//! ## Other
//! - [`ColorSpaceId::CieXyz`] - Radiance XYZE files
//! - [`ColorSpaceId::Unknown`] - No tag could be determined

use std::fmt;
use std::str::FromStr;

/// Runtime color space tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpaceId {
    /// Rec.709 primaries, linear transfer.
    LinearSrgb,
    /// Display P3 primaries, linear transfer.
    LinearDisplayP3,
    /// Rec.2020 primaries, linear transfer.
    LinearRec2020,
    /// Rec.2100 PQ.
    Rec2100Pq,
    /// Rec.2100 HLG.
    Rec2100Hlg,
    /// sRGB (display-referred SDR).
    Srgb,
    /// Display P3 with sRGB transfer (display-referred SDR).
    DisplayP3,
    /// CIE XYZ.
    CieXyz,
    /// Untagged source.
    #[default]
    Unknown,
}

impl ColorSpaceId {
    /// Canonical name used in logs and metadata.
    pub fn name(self) -> &'static str {
        match self {
            Self::LinearSrgb => "linear-srgb",
            Self::LinearDisplayP3 => "linear-display-p3",
            Self::LinearRec2020 => "linear-rec2020",
            Self::Rec2100Pq => "rec2100-pq",
            Self::Rec2100Hlg => "rec2100-hlg",
            Self::Srgb => "srgb",
            Self::DisplayP3 => "display-p3",
            Self::CieXyz => "cie-xyz",
            Self::Unknown => "unknown",
        }
    }

    /// Source encoding used a linear transfer.
    pub fn is_linear(self) -> bool {
        matches!(
            self,
            Self::LinearSrgb | Self::LinearDisplayP3 | Self::LinearRec2020
        )
    }

    /// Source encoding can carry values above SDR reference white.
    pub fn is_hdr_capable(self) -> bool {
        self.is_linear() || matches!(self, Self::Rec2100Pq | Self::Rec2100Hlg)
    }

    /// Source encoding is a display-referred SDR space.
    pub fn is_sdr(self) -> bool {
        matches!(self, Self::Srgb | Self::DisplayP3)
    }
}

impl fmt::Display for ColorSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorSpaceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "linear-srgb" | "linear" | "lin-rec709" => Ok(Self::LinearSrgb),
            "linear-display-p3" | "linear-p3" => Ok(Self::LinearDisplayP3),
            "linear-rec2020" | "lin-rec2020" => Ok(Self::LinearRec2020),
            "rec2100-pq" | "pq" => Ok(Self::Rec2100Pq),
            "rec2100-hlg" | "hlg" => Ok(Self::Rec2100Hlg),
            "srgb" => Ok(Self::Srgb),
            "display-p3" | "p3" => Ok(Self::DisplayP3),
            "cie-xyz" | "xyz" => Ok(Self::CieXyz),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown color space: {other}")),
        }
    }
}
