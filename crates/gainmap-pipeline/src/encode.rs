//! Encode with verification and strategy fallback.
//!
//! ```text
//! intermediate container (lossless, HDR aux)  -> engine computes gain map
//!        |
//! extract gain map                             -> Failed on error or absence
//!        |
//! for strategy in order:
//!     write final container (gain map aux + maker attrs)
//!         error            -> next strategy, or Failed(error) if last
//!     verify gain map present with non-zero extent
//!         missing          -> next strategy, or Failed("gain map missing after write")
//!     Written
//! ```

use crate::ItemError;
use crate::config::PipelineConfig;
use gainmap_core::{Attrs, Image};
use gainmap_engine::{AuxImage, ContainerRequest, Engine};
use gainmap_io::{EncoderStrategy, GainMap};
use std::path::Path;
use tracing::{debug, warn};

/// Terminal failure reason when no strategy leaves a gain map behind.
pub const GAIN_MAP_MISSING: &str = "gain map missing after write";

/// Result of a successful encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOutcome {
    /// Strategy that produced the verified file.
    pub strategy: EncoderStrategy,
    /// Number of strategies tried, including the successful one.
    pub attempts: usize,
}

/// Drives the engine's container writer for one item.
pub struct EncodeVerifier<'a> {
    engine: &'a dyn Engine,
    strategies: Vec<EncoderStrategy>,
    verify: bool,
    quality: f32,
    gain_map_scale: u32,
}

impl<'a> EncodeVerifier<'a> {
    /// Verifier with explicit strategy order.
    pub fn new(engine: &'a dyn Engine, strategies: Vec<EncoderStrategy>) -> Self {
        Self {
            engine,
            strategies,
            verify: true,
            quality: 1.0,
            gain_map_scale: 1,
        }
    }

    /// Verifier configured from a pipeline config on this host.
    pub fn from_config(engine: &'a dyn Engine, config: &PipelineConfig) -> Self {
        Self::new(engine, config.strategy_order())
            .with_verify(config.verify_after_write)
            .with_quality(config.compression_quality)
            .with_gain_map_scale(config.gain_map_scale)
    }

    /// Enables or disables the post-write check.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Base image quality in [0, 1].
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    /// Gain map downscale factor.
    pub fn with_gain_map_scale(mut self, scale: u32) -> Self {
        self.gain_map_scale = scale.max(1);
        self
    }

    /// Strategies in the order they will be tried.
    pub fn strategies(&self) -> &[EncoderStrategy] {
        &self.strategies
    }

    /// Writes `destination` from an SDR base, its HDR source and the
    /// attributes to embed.
    pub fn encode(
        &self,
        sdr: &Image,
        hdr: &Image,
        metadata: &Attrs,
        destination: &Path,
    ) -> Result<EncodeOutcome, ItemError> {
        let gain_map = self.extract_gain_map(sdr, hdr, destination)?;
        self.write_with_fallback(sdr, &gain_map, metadata, destination)
    }

    /// Steps 1-2: compute the gain map through a throwaway container.
    fn extract_gain_map(
        &self,
        sdr: &Image,
        hdr: &Image,
        destination: &Path,
    ) -> Result<GainMap, ItemError> {
        let parent = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let scratch = tempfile::Builder::new()
            .prefix(".gainmap-")
            .tempdir_in(parent)
            .map_err(|e| ItemError::failed(format!("Cannot create scratch dir: {e}")))?;
        let intermediate = scratch.path().join("intermediate.gmap");

        let request = ContainerRequest::new(sdr)
            .with_aux(AuxImage::Hdr(hdr))
            .with_quality(1.0)
            .with_strategy(EncoderStrategy::TenBit)
            .with_gain_map_scale(self.gain_map_scale);
        self.engine
            .write_container(&request, &intermediate)
            .map_err(|e| ItemError::failed(format!("Cannot write intermediate container: {e}")))?;

        match self.engine.read_aux_gain_map(&intermediate) {
            Ok(Some(gain)) if gain.has_extent() => Ok(gain),
            Ok(_) => Err(ItemError::failed("intermediate container has no gain map")),
            Err(e) => Err(ItemError::failed(format!("Cannot extract gain map: {e}"))),
        }
    }

    /// Steps 3-6: the strategy fold.
    fn write_with_fallback(
        &self,
        sdr: &Image,
        gain_map: &GainMap,
        metadata: &Attrs,
        destination: &Path,
    ) -> Result<EncodeOutcome, ItemError> {
        let mut failure = ItemError::failed("no encoder strategy configured");

        for (i, &strategy) in self.strategies.iter().enumerate() {
            let remaining = self.strategies.len() - i - 1;
            let request = ContainerRequest::new(sdr)
                .with_aux(AuxImage::GainMap(gain_map))
                .with_metadata(metadata.clone())
                .with_quality(self.quality)
                .with_strategy(strategy);

            if let Err(e) = self.engine.write_container(&request, destination) {
                warn!(%strategy, remaining, error = %e, "container write failed");
                failure = ItemError::failed(format!("{strategy} writer failed: {e}"));
                continue;
            }

            if self.verify && !self.gain_map_present(destination) {
                warn!(%strategy, remaining, "gain map missing after write");
                failure = ItemError::failed(GAIN_MAP_MISSING);
                continue;
            }

            debug!(%strategy, attempts = i + 1, path = %destination.display(), "written");
            return Ok(EncodeOutcome {
                strategy,
                attempts: i + 1,
            });
        }

        discard(destination);
        Err(failure)
    }

    fn gain_map_present(&self, path: &Path) -> bool {
        match self.engine.read_aux_gain_map(path) {
            Ok(Some(gain)) => gain.has_extent(),
            Ok(None) => false,
            Err(e) => {
                debug!(error = %e, path = %path.display(), "verification read failed");
                false
            }
        }
    }
}

/// Removes a rejected output so no partial file is left behind.
fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(error = %e, path = %path.display(), "cannot remove rejected output");
        }
    }
}
