//! # gainmap-pipeline
//!
//! Per-item conversion pipeline and batch driver.
//!
//! - [`PipelineConfig`] - Every run option, loadable from YAML
//! - [`item::process_item`] - HDR (+ SDR) to a verified gain map container
//! - [`EncodeVerifier`] - Strategy fallback with gain map verification
//! - [`BatchDriver`] - Bounded worker pool with shared [`RunStats`]
//!
//! # Example
//!
//! ```rust,ignore
//! use gainmap_engine::CpuEngine;
//! use gainmap_pipeline::{BatchDriver, PipelineConfig, TracingSink, WorkItem};
//!
//! let engine = CpuEngine::new();
//! let driver = BatchDriver::new(&engine, PipelineConfig::default())?;
//! let items = vec![WorkItem::new("in/a.hdr", "out/a.gmap")];
//! let summary = driver.run(&items, &TracingSink)?;
//! println!("{summary}");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod batch;
pub mod config;
pub mod encode;
mod error;
pub mod item;
pub mod stats;

pub use batch::{BatchDriver, NullSink, ProgressSink, TracingSink};
pub use config::{EncoderChoice, HeadroomMode, PipelineConfig, StrategyTable};
pub use encode::{EncodeOutcome, EncodeVerifier};
pub use error::{ItemError, PipelineError, PipelineResult};
pub use item::{Analysis, ItemReport, WorkItem};
pub use stats::{RunStats, RunSummary};
