//! Engine trait and request types.
//!
//! ```text
//! Engine: Send + Sync
//!     +-- CpuEngine  (rayon parallelization)
//! ```

mod cpu_backend;

pub use cpu_backend::CpuEngine;

use crate::EngineResult;
use gainmap_core::{Attrs, Image};
use gainmap_io::{EncoderStrategy, GainMap};
use std::path::Path;

/// Auxiliary plane handed to the container writer.
#[derive(Debug, Clone, Copy)]
pub enum AuxImage<'a> {
    /// HDR rendition; the writer derives the gain map from it.
    Hdr(&'a Image),
    /// Gain map computed earlier, stored as is.
    GainMap(&'a GainMap),
}

/// Everything the container writer needs for one output file.
#[derive(Debug, Clone)]
pub struct ContainerRequest<'a> {
    /// SDR base image.
    pub base: &'a Image,
    /// Auxiliary plane, if any.
    pub aux: Option<AuxImage<'a>>,
    /// Attributes merged over the base image metadata.
    pub metadata: Attrs,
    /// Base image quality in [0, 1].
    pub quality: f32,
    /// Writer entry point.
    pub strategy: EncoderStrategy,
    /// Gain map downscale factor (1 = full resolution).
    pub gain_map_scale: u32,
}

impl<'a> ContainerRequest<'a> {
    /// Lossless request for `base` with no auxiliary plane.
    pub fn new(base: &'a Image) -> Self {
        Self {
            base,
            aux: None,
            metadata: Attrs::new(),
            quality: 1.0,
            strategy: EncoderStrategy::Legacy,
            gain_map_scale: 1,
        }
    }

    pub fn with_aux(mut self, aux: AuxImage<'a>) -> Self {
        self.aux = Some(aux);
        self
    }

    pub fn with_metadata(mut self, metadata: Attrs) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_strategy(mut self, strategy: EncoderStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_gain_map_scale(mut self, scale: u32) -> Self {
        self.gain_map_scale = scale.max(1);
        self
    }
}

/// Rendering and container primitives consumed by the conversion core.
pub trait Engine: Send + Sync {
    /// Engine name.
    fn name(&self) -> &'static str;

    /// Projects RGB onto a single luma channel stored in red.
    ///
    /// Green and blue are zero, alpha is one.
    fn render_luma(&self, image: &Image, weights: [f32; 3]) -> Image;

    /// Per-channel maximum sampled as a 1x1 result.
    ///
    /// `None` when the engine cannot reduce the image.
    fn reduce_max(&self, image: &Image) -> Option<[f32; 4]>;

    /// Per-channel masses over `bins` equal-width bins covering [0, 1].
    ///
    /// Masses are fractions of the pixel count. `None` when the engine
    /// cannot reduce the image or `bins` is out of range.
    fn reduce_histogram(&self, image: &Image, bins: usize) -> Option<Vec<[f32; 4]>>;

    /// Maps an HDR image with `source_headroom` down to `target_headroom`.
    fn tone_map(&self, hdr: &Image, source_headroom: f32, target_headroom: f32)
    -> EngineResult<Image>;

    /// Writes a gain map container.
    fn write_container(&self, request: &ContainerRequest<'_>, path: &Path) -> EngineResult<()>;

    /// Reads the gain map plane of a container; `None` when absent.
    fn read_aux_gain_map(&self, path: &Path) -> EngineResult<Option<GainMap>>;
}
