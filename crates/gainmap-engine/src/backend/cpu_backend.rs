//! CPU engine using rayon for parallelization.

use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, trace};

use super::{AuxImage, ContainerRequest, Engine};
use crate::{EngineResult, gainmap, tonemap};
use gainmap_core::image::CHANNELS;
use gainmap_core::{ColorSpaceId, Image, MAX_HISTOGRAM_BINS};
use gainmap_io::{GainMap, GainMapContainer, container};

/// Largest side length the reductions accept.
pub const DEFAULT_MAX_EXTENT: u32 = 65_535;

/// CPU implementation of every engine primitive.
#[derive(Debug, Clone)]
pub struct CpuEngine {
    max_extent: u32,
}

impl CpuEngine {
    pub fn new() -> Self {
        Self {
            max_extent: DEFAULT_MAX_EXTENT,
        }
    }

    /// Limits the side length reductions will process.
    pub fn with_max_extent(mut self, max_extent: u32) -> Self {
        self.max_extent = max_extent;
        self
    }

    fn supports(&self, image: &Image) -> bool {
        image.width() <= self.max_extent && image.height() <= self.max_extent
    }
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for CpuEngine {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn render_luma(&self, image: &Image, weights: [f32; 3]) -> Image {
        image
            .map_pixels(|p| {
                let l = p[0] * weights[0] + p[1] * weights[1] + p[2] * weights[2];
                [l, 0.0, 0.0, 1.0]
            })
            .with_color_space(ColorSpaceId::Unknown)
    }

    fn reduce_max(&self, image: &Image) -> Option<[f32; 4]> {
        if !self.supports(image) {
            debug!(width = image.width(), height = image.height(), "max reduction: unsupported extent");
            return None;
        }
        let max = image
            .data()
            .par_chunks_exact(CHANNELS)
            .fold(
                || [f32::NEG_INFINITY; 4],
                |mut acc, px| {
                    for c in 0..CHANNELS {
                        // NaN samples are ignored by f32::max
                        acc[c] = acc[c].max(px[c]);
                    }
                    acc
                },
            )
            .reduce(
                || [f32::NEG_INFINITY; 4],
                |a, b| [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2]), a[3].max(b[3])],
            );
        trace!(?max, "max reduction");
        Some(max)
    }

    fn reduce_histogram(&self, image: &Image, bins: usize) -> Option<Vec<[f32; 4]>> {
        if bins == 0 || bins > MAX_HISTOGRAM_BINS || !self.supports(image) {
            debug!(bins, width = image.width(), "histogram reduction: unsupported request");
            return None;
        }
        let counts = image
            .data()
            .par_chunks_exact(CHANNELS)
            .fold(
                || vec![[0u64; 4]; bins],
                |mut acc, px| {
                    for c in 0..CHANNELS {
                        acc[bin_index(px[c], bins)][c] += 1;
                    }
                    acc
                },
            )
            .reduce(
                || vec![[0u64; 4]; bins],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        for c in 0..CHANNELS {
                            x[c] += y[c];
                        }
                    }
                    a
                },
            );
        let total = image.pixel_count() as f64;
        Some(
            counts
                .into_iter()
                .map(|c| c.map(|n| (n as f64 / total) as f32))
                .collect(),
        )
    }

    fn tone_map(
        &self,
        hdr: &Image,
        source_headroom: f32,
        target_headroom: f32,
    ) -> EngineResult<Image> {
        Ok(tonemap::extended_reinhard(hdr, source_headroom, target_headroom))
    }

    fn write_container(&self, request: &ContainerRequest<'_>, path: &Path) -> EngineResult<()> {
        let gain_map = match request.aux {
            Some(AuxImage::Hdr(hdr)) => Some(gainmap::compute_gain_map(
                request.base,
                hdr,
                request.gain_map_scale,
            )?),
            Some(AuxImage::GainMap(g)) => Some(g.clone()),
            None => None,
        };

        let mut attrs = request.base.metadata().clone();
        for (key, value) in request.metadata.iter() {
            attrs.set(key.clone(), value.clone());
        }

        let out = GainMapContainer {
            base: request.base.with_metadata(attrs),
            gain_map,
            quality: request.quality,
            strategy: request.strategy,
        };
        debug!(
            path = %path.display(),
            strategy = %request.strategy,
            quality = request.quality,
            "writing container"
        );
        container::write(path, &out)?;
        Ok(())
    }

    fn read_aux_gain_map(&self, path: &Path) -> EngineResult<Option<GainMap>> {
        Ok(container::read_gain_map(path)?)
    }
}

/// Bin for a sample over [0, 1]; out-of-range values land in the end bins.
#[inline]
fn bin_index(v: f32, bins: usize) -> usize {
    if v.is_nan() || v <= 0.0 {
        return 0;
    }
    ((v as f64 * bins as f64) as usize).min(bins - 1)
}
