//! Rendering engine for HDR to SDR + gain map conversion.
//!
//! The statistical core never touches pixels directly; it drives an
//! [`Engine`] that provides six primitives:
//!
//! ```text
//! Engine (trait)
//!     +-- render_luma        weighted RGB -> single luma channel
//!     +-- reduce_max         1x1 per-channel maximum
//!     +-- reduce_histogram   N-bin per-channel masses over [0, 1]
//!     +-- tone_map           HDR -> SDR at a source headroom
//!     +-- write_container    base + aux image + metadata -> .gmap
//!     +-- read_aux_gain_map  .gmap -> gain map plane
//! ```
//!
//! [`CpuEngine`] implements all of them with rayon. Tests substitute their
//! own implementations to exercise failure paths.
//!
//! # Example
//!
//! ```ignore
//! use gainmap_engine::{CpuEngine, Engine};
//!
//! let engine = CpuEngine::new();
//! let luma = engine.render_luma(&hdr, gainmap_core::REC709_LUMA);
//! let peak = engine.reduce_max(&luma);
//! ```

pub mod backend;
pub mod gainmap;
pub mod tonemap;

pub use backend::{AuxImage, ContainerRequest, CpuEngine, Engine};

use thiserror::Error;

/// Engine operation errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),

    #[error("Engine operation failed: {0}")]
    OperationFailed(String),

    #[error(transparent)]
    Io(#[from] gainmap_io::IoError),

    #[error(transparent)]
    Core(#[from] gainmap_core::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
