//! # gainmap-ops
//!
//! The statistical and metadata core of gain map conversion.
//!
//! # Modules
//!
//! - [`luminance`] - Linear luma, peak luminance and normalized histograms
//! - [`headroom`] - Percentile and max-based headroom policies
//! - [`maker`] - Headroom to maker metadata mapping with round-trip validation
//! - [`clip`] - Clip fraction, clip mask and diagnostic overlay
//!
//! All pixel work goes through a [`gainmap_engine::Engine`]; everything in
//! this crate is a pure function of its outputs.
//!
//! # Example
//!
//! ```rust,ignore
//! use gainmap_ops::{headroom, luminance::LuminanceStats, maker};
//!
//! let stats = LuminanceStats::measure(&engine, &hdr)?;
//! let result = headroom::estimate(&engine, &stats, HeadroomPolicy::default(), 1024)?;
//! let solution = maker::from_headroom(result.headroom_ratio)?;
//! maker::check(solution.headroom, &solution.default)?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod clip;
mod error;
pub mod headroom;
pub mod luminance;
pub mod maker;

pub use clip::ClipStats;
pub use error::{OpsError, OpsResult};
pub use headroom::{HeadroomPolicy, HeadroomResult};
pub use luminance::LuminanceStats;
pub use maker::{MakerBranch, MakerCandidate, MakerSolution, ValidationDiffs};
