//! Maker metadata codec.
//!
//! Two numeric maker fields encode headroom for HDR-aware viewers. The
//! forward map from fields to stops is piecewise affine over four branches,
//! selected by `field33` and by which side of 0.01 `field48` falls on:
//!
//! | branch | field33 | domain          | stops                     |
//! |--------|---------|-----------------|---------------------------|
//! | A      | 0       | field48 <= 0.01 | `-20.0 * f48 + 1.8`       |
//! | B      | 0       | field48 > 0.01  | `-0.101 * f48 + 1.601`    |
//! | C      | 1       | field48 <= 0.01 | `-70.0 * f48 + 3.0`       |
//! | D      | 1       | field48 > 0.01  | `-0.303 * f48 + 2.303`    |
//!
//! [`from_headroom`] inverts every branch and keeps the results that land in
//! their own domain; [`validate`] pushes a candidate back through
//! [`to_stops`] and checks the round trip.

use crate::{OpsError, OpsResult};
use std::fmt;
use tracing::trace;

/// Largest headroom the fields can express (3 stops).
pub const MAX_HEADROOM: f64 = 8.0;

/// `field48` boundary between the steep and shallow segments.
pub const FIELD48_SPLIT: f64 = 0.01;

/// Default absolute tolerance on the stops round trip.
pub const DEFAULT_TOL_STOPS: f64 = 0.01;

/// Default relative tolerance on the headroom round trip.
pub const DEFAULT_TOL_HEADROOM: f64 = 0.02;

/// One affine segment of the forward map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MakerBranch {
    /// `field33 = 0`, `field48 <= 0.01`.
    A,
    /// `field33 = 0`, `field48 > 0.01`.
    B,
    /// `field33 = 1`, `field48 <= 0.01`.
    C,
    /// `field33 = 1`, `field48 > 0.01`.
    D,
}

impl MakerBranch {
    /// Evaluation order.
    pub const ALL: [MakerBranch; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// `field33` value selecting this branch.
    pub fn field33(self) -> f64 {
        match self {
            Self::A | Self::B => 0.0,
            Self::C | Self::D => 1.0,
        }
    }

    /// `(slope, intercept)` of `stops = slope * field48 + intercept`.
    fn line(self) -> (f64, f64) {
        match self {
            Self::A => (-20.0, 1.8),
            Self::B => (-0.101, 1.601),
            Self::C => (-70.0, 3.0),
            Self::D => (-0.303, 2.303),
        }
    }

    /// Whether `field48` lies in this branch's domain.
    pub fn accepts(self, field48: f64) -> bool {
        match self {
            Self::A | Self::C => field48 <= FIELD48_SPLIT,
            Self::B | Self::D => field48 > FIELD48_SPLIT,
        }
    }

    /// `field48` producing `stops` on this branch's line.
    pub fn inverse(self, stops: f64) -> f64 {
        let (slope, intercept) = self.line();
        (intercept - stops) / -slope
    }

    /// Stops produced by `field48` on this branch's line.
    pub fn forward(self, field48: f64) -> f64 {
        let (slope, intercept) = self.line();
        slope * field48 + intercept
    }

    /// Branch the forward map uses for a pair of fields.
    pub fn select(field33: f64, field48: f64) -> Self {
        match (field33 >= 1.0, field48 <= FIELD48_SPLIT) {
            (false, true) => Self::A,
            (false, false) => Self::B,
            (true, true) => Self::C,
            (true, false) => Self::D,
        }
    }
}

impl fmt::Display for MakerBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        f.write_str(s)
    }
}

/// One valid field pair for a headroom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MakerCandidate {
    /// 0.0 or 1.0.
    pub field33: f64,
    /// Branch-specific value.
    pub field48: f64,
    /// `log2` of the clamped headroom.
    pub stops: f64,
    /// Segment that produced the pair.
    pub branch: MakerBranch,
}

/// Output of [`from_headroom`].
#[derive(Debug, Clone, PartialEq)]
pub struct MakerSolution {
    /// Headroom after clamping to `[1, 8]`.
    pub headroom: f64,
    /// `log2(headroom)`.
    pub stops: f64,
    /// Valid candidates in evaluation order.
    pub candidates: Vec<MakerCandidate>,
    /// Candidate chosen by the priority rule.
    pub default: MakerCandidate,
}

/// Inverse map: headroom to maker fields.
///
/// The headroom is clamped to `[1, 8]`. The default candidate is the first
/// of: `field33 = 1` with `field48 <= 0.01`, any `field33 = 1`, any valid
/// candidate.
///
/// # Errors
///
/// [`OpsError::NoCandidate`] when no branch accepts the headroom.
pub fn from_headroom(headroom: f64) -> OpsResult<MakerSolution> {
    let clamped = if headroom.is_nan() {
        1.0
    } else {
        headroom.clamp(1.0, MAX_HEADROOM)
    };
    let stops = clamped.log2();

    let candidates: Vec<MakerCandidate> = MakerBranch::ALL
        .iter()
        .filter_map(|&branch| {
            let field48 = branch.inverse(stops);
            (field48.is_finite() && branch.accepts(field48)).then_some(MakerCandidate {
                field33: branch.field33(),
                field48,
                stops,
                branch,
            })
        })
        .collect();

    let default = candidates
        .iter()
        .find(|c| c.field33 >= 1.0 && c.field48 <= FIELD48_SPLIT)
        .or_else(|| candidates.iter().find(|c| c.field33 >= 1.0))
        .or_else(|| candidates.first())
        .copied()
        .ok_or(OpsError::NoCandidate { headroom: clamped })?;

    trace!(
        headroom = clamped,
        stops,
        candidates = candidates.len(),
        branch = %default.branch,
        field48 = default.field48,
        "maker fields"
    );
    Ok(MakerSolution {
        headroom: clamped,
        stops,
        candidates,
        default,
    })
}

/// Forward map: maker fields to stops.
pub fn to_stops(field33: f64, field48: f64) -> f64 {
    MakerBranch::select(field33, field48).forward(field48)
}

/// Round-trip comparison of a field pair against its target headroom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationDiffs {
    /// `log2(max(headroom, 1))`.
    pub target_stops: f64,
    /// Stops from [`to_stops`].
    pub forward_stops: f64,
    /// `|forward_stops - target_stops|`.
    pub abs_stops_diff: f64,
    /// `max(headroom, 1)`.
    pub target_headroom: f64,
    /// `2^max(forward_stops, 0)`.
    pub forward_headroom: f64,
    /// `|forward_headroom - target_headroom| / target_headroom`.
    pub rel_headroom_diff: f64,
    /// Branch the forward map used.
    pub branch: MakerBranch,
}

impl fmt::Display for ValidationDiffs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "branch {} stops {:.4} vs {:.4} (diff {:.4}), headroom {:.4} vs {:.4} (rel {:.4})",
            self.branch,
            self.forward_stops,
            self.target_stops,
            self.abs_stops_diff,
            self.forward_headroom,
            self.target_headroom,
            self.rel_headroom_diff
        )
    }
}

/// Checks that `(field33, field48)` maps back to `headroom`.
///
/// Returns whether both tolerances hold, plus the measured differences.
pub fn validate(
    headroom: f64,
    field33: f64,
    field48: f64,
    tol_stops_abs: f64,
    tol_headroom_rel: f64,
) -> (bool, ValidationDiffs) {
    let target_headroom = headroom.max(1.0);
    let target_stops = target_headroom.log2();
    let forward_stops = to_stops(field33, field48);
    let forward_headroom = forward_stops.max(0.0).exp2();

    let abs_stops_diff = (forward_stops - target_stops).abs();
    let rel_headroom_diff = (forward_headroom - target_headroom).abs() / target_headroom;
    // NaN comparisons are false, so non-finite inputs fail here.
    let ok = abs_stops_diff <= tol_stops_abs && rel_headroom_diff <= tol_headroom_rel;

    let diffs = ValidationDiffs {
        target_stops,
        forward_stops,
        abs_stops_diff,
        target_headroom,
        forward_headroom,
        rel_headroom_diff,
        branch: MakerBranch::select(field33, field48),
    };
    (ok, diffs)
}

/// [`validate`] with default tolerances, failing on drift.
///
/// # Errors
///
/// [`OpsError::ValidationFailed`] when either tolerance is exceeded.
pub fn check(headroom: f64, candidate: &MakerCandidate) -> OpsResult<ValidationDiffs> {
    let (ok, diffs) = validate(
        headroom,
        candidate.field33,
        candidate.field48,
        DEFAULT_TOL_STOPS,
        DEFAULT_TOL_HEADROOM,
    );
    if ok {
        Ok(diffs)
    } else {
        Err(OpsError::ValidationFailed { diffs })
    }
}
