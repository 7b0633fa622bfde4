//! Normalized luminance histogram.
//!
//! Bin `i` of an `N`-bin histogram covers `[i/N, (i+1)/N)` of normalized
//! luminance; the last bin also takes the value `1.0`. Masses are
//! non-negative and may be raw counts or fractions, callers only rely on
//! ratios against [`Histogram::total`].

use crate::{Error, Result};

/// Largest bin count the histogram reduction supports.
pub const MAX_HISTOGRAM_BINS: usize = 2048;

/// Ordered, non-negative bin masses over `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    bins: Vec<f64>,
}

impl Histogram {
    /// Builds a histogram from bin masses.
    ///
    /// Non-finite and negative masses are stored as zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBinCount`] when `masses` is empty or longer
    /// than [`MAX_HISTOGRAM_BINS`].
    pub fn from_masses(masses: Vec<f64>) -> Result<Self> {
        if masses.is_empty() || masses.len() > MAX_HISTOGRAM_BINS {
            return Err(Error::InvalidBinCount(masses.len()));
        }
        let bins = masses
            .into_iter()
            .map(|m| if m.is_finite() && m > 0.0 { m } else { 0.0 })
            .collect();
        Ok(Self { bins })
    }

    /// Number of bins.
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Width of one bin in normalized units.
    #[inline]
    pub fn bin_width(&self) -> f64 {
        1.0 / self.bins.len() as f64
    }

    /// Mass of bin `i`.
    #[inline]
    pub fn mass(&self, i: usize) -> f64 {
        self.bins[i]
    }

    /// All bin masses.
    #[inline]
    pub fn masses(&self) -> &[f64] {
        &self.bins
    }

    /// Sum of all masses.
    pub fn total(&self) -> f64 {
        self.bins.iter().sum()
    }

    /// Running sum of masses; `cdf()[i]` includes bin `i`.
    pub fn cdf(&self) -> Vec<f64> {
        self.bins
            .iter()
            .scan(0.0, |acc, &m| {
                *acc += m;
                Some(*acc)
            })
            .collect()
    }

    /// Normalized centre of bin `i`.
    #[inline]
    pub fn bin_center(&self, i: usize) -> f64 {
        (i as f64 + 0.5) / self.bins.len() as f64
    }

    /// Normalized upper edge of bin `i`.
    #[inline]
    pub fn bin_upper(&self, i: usize) -> f64 {
        (i + 1) as f64 / self.bins.len() as f64
    }

    /// Index of the bin containing normalized value `v`, clamped to range.
    pub fn bin_of(&self, v: f64) -> usize {
        let n = self.bins.len();
        if v.is_nan() || v <= 0.0 {
            return 0;
        }
        ((v * n as f64).floor() as usize).min(n - 1)
    }
}
