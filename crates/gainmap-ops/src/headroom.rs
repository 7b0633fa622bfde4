//! Headroom estimation.
//!
//! Two policies turn luminance statistics into a headroom ratio:
//!
//! - **Percentile**: the bin centre at which the luma CDF reaches `p`,
//!   scaled back by the peak.
//! - **Max** (default): the peak itself, softened for tone mapping as
//!   `max(1, 1 + h - h^r)`.
//!
//! The softening keeps near-SDR images close to 1 and compresses very
//! bright peaks so the tone mapper does not crush highlights.

use crate::luminance::LuminanceStats;
use crate::{OpsError, OpsResult};
use gainmap_core::Histogram;
use gainmap_engine::Engine;
use std::fmt;
use tracing::debug;

/// Default blend exponent of the max policy.
pub const DEFAULT_TONEMAP_RATIO: f64 = 0.2;

/// Headroom policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadroomPolicy {
    /// Luma percentile in `(0, 100]`.
    Percentile {
        /// Target percentile.
        percentile: f64,
    },
    /// Peak luma, softened with exponent `tonemap_ratio` in `[0, 1]`.
    Max {
        /// Blend exponent.
        tonemap_ratio: f64,
    },
}

impl Default for HeadroomPolicy {
    fn default() -> Self {
        Self::Max {
            tonemap_ratio: DEFAULT_TONEMAP_RATIO,
        }
    }
}

impl HeadroomPolicy {
    /// Checks the policy parameter range.
    pub fn validate(&self) -> OpsResult<()> {
        match *self {
            Self::Percentile { percentile } if percentile == 0.0 || !(0.0..=100.0).contains(&percentile) => Err(
                OpsError::InvalidParameter(format!("percentile {percentile} outside (0, 100]")),
            ),
            Self::Max { tonemap_ratio } if !(0.0..=1.0).contains(&tonemap_ratio) => Err(
                OpsError::InvalidParameter(format!("tonemap ratio {tonemap_ratio} outside [0, 1]")),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for HeadroomPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile { percentile } => write!(f, "percentile({percentile})"),
            Self::Max { tonemap_ratio } => write!(f, "max(r={tonemap_ratio})"),
        }
    }
}

/// Measured and effective headroom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadroomResult {
    /// Measured linear headroom (peak or percentile value).
    pub pic_headroom: f64,
    /// Value fed to tone mapping and clip analysis, always `>= 1`.
    pub headroom_ratio: f64,
}

impl HeadroomResult {
    /// No headroom above SDR white.
    pub const NONE: Self = Self {
        pic_headroom: 1.0,
        headroom_ratio: 1.0,
    };
}

/// Percentile headroom from a peak-normalized histogram.
///
/// Finds the first bin whose cumulative mass reaches `percentile / 100` of
/// the total and returns its centre times `abs_max`. Returns 1.0 when the
/// histogram is empty or the peak is missing or zero.
pub fn percentile_headroom(hist: &Histogram, percentile: f64, abs_max: Option<f64>) -> f64 {
    let abs_max = match abs_max {
        Some(m) if m.is_finite() && m > 0.0 => m,
        _ => return 1.0,
    };
    let total = hist.total();
    if total <= 0.0 {
        return 1.0;
    }
    let target = percentile / 100.0 * total;
    let k = hist
        .cdf()
        .iter()
        .position(|&c| c >= target)
        .unwrap_or(hist.bin_count() - 1);
    hist.bin_center(k) * abs_max
}

/// Softened tone-map ratio of the max policy: `max(1, 1 + h - h^r)`.
pub fn softened_ratio(pic_headroom: f64, tonemap_ratio: f64) -> f64 {
    let h = pic_headroom.max(0.0);
    let ratio = 1.0 + h - h.powf(tonemap_ratio);
    if ratio.is_finite() { ratio.max(1.0) } else { 1.0 }
}

/// Applies `policy` to measured luminance statistics.
///
/// # Errors
///
/// [`OpsError::NoOutput`] when the histogram reduction fails.
pub fn estimate(
    engine: &dyn Engine,
    stats: &LuminanceStats,
    policy: HeadroomPolicy,
    bin_count: usize,
) -> OpsResult<HeadroomResult> {
    let abs_max = stats.abs_max();
    let result = match policy {
        HeadroomPolicy::Max { tonemap_ratio } => {
            // peaks at or below SDR white carry no headroom
            let pic_headroom = abs_max.max(1.0);
            HeadroomResult {
                pic_headroom,
                headroom_ratio: softened_ratio(pic_headroom, tonemap_ratio),
            }
        }
        HeadroomPolicy::Percentile { .. } if abs_max <= 0.0 => HeadroomResult::NONE,
        HeadroomPolicy::Percentile { percentile } => {
            let hist = stats.histogram(engine, bin_count)?;
            let pic_headroom = percentile_headroom(&hist, percentile, Some(abs_max));
            HeadroomResult {
                pic_headroom,
                headroom_ratio: pic_headroom.max(1.0),
            }
        }
    };
    debug!(
        %policy,
        abs_max,
        pic_headroom = result.pic_headroom,
        headroom_ratio = result.headroom_ratio,
        "headroom estimated"
    );
    Ok(result)
}
