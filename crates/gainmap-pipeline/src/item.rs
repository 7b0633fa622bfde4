//! Per-item pipeline.
//!
//! ```text
//! read HDR (+ SDR) -> preconditions -> luminance stats -> headroom
//!     -> clip diagnostics -> maker fields + validation -> tone map
//!     -> encode with verification
//! ```
//!
//! Steps run strictly in order inside one worker. Precondition violations
//! are [`ItemError::Skipped`]; everything after is [`ItemError::Failed`].

use crate::batch::ProgressSink;
use crate::config::PipelineConfig;
use crate::encode::{EncodeOutcome, EncodeVerifier};
use crate::ItemError;
use gainmap_core::metadata::keys;
use gainmap_core::{AttrValue, Attrs, Image};
use gainmap_engine::Engine;
use gainmap_ops::{
    ClipStats, HeadroomResult, LuminanceStats, MakerSolution, ValidationDiffs, clip, headroom,
    maker,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info_span};

/// One input pair and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Name used in logs and run statistics.
    pub name: String,
    /// HDR source.
    pub hdr_path: PathBuf,
    /// Optional pre-graded SDR rendition.
    pub sdr_path: Option<PathBuf>,
    /// Output container path.
    pub destination: PathBuf,
}

impl WorkItem {
    /// Item named after the HDR file name.
    pub fn new(hdr_path: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        let hdr_path = hdr_path.into();
        let name = hdr_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| hdr_path.display().to_string());
        Self {
            name,
            hdr_path,
            sdr_path: None,
            destination: destination.into(),
        }
    }

    /// Pairs the item with an SDR rendition.
    pub fn with_sdr(mut self, sdr_path: impl Into<PathBuf>) -> Self {
        self.sdr_path = Some(sdr_path.into());
        self
    }

    /// Where the clip overlay for this item goes.
    pub fn overlay_path(&self) -> PathBuf {
        self.destination.with_extension("clip.png")
    }
}

/// Everything measured about an HDR image before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Peak linear luminance.
    pub abs_max: f64,
    /// Headroom policy output.
    pub headroom: HeadroomResult,
    /// Maker fields for the measured headroom.
    pub maker: MakerSolution,
    /// Round-trip check of the default candidate.
    pub validation: ValidationDiffs,
    /// Threshold the clip statistics were taken at.
    pub clip_threshold: f64,
    /// Share of pixels above `clip_threshold`.
    pub clip: ClipStats,
}

/// Outcome of a written item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    /// Measurements.
    pub analysis: Analysis,
    /// Encode result.
    pub encode: EncodeOutcome,
}

/// Rejects inputs the pipeline cannot convert.
pub fn check_preconditions(hdr: &Image, sdr: Option<&Image>) -> Result<(), ItemError> {
    if !hdr.color_space().is_linear() {
        return Err(ItemError::skipped(format!(
            "HDR color space {} is not linear",
            hdr.color_space()
        )));
    }
    let Some(sdr) = sdr else {
        return Ok(());
    };
    if !sdr.color_space().is_sdr() {
        return Err(ItemError::skipped(format!(
            "SDR color space {} is not an SDR encoding",
            sdr.color_space()
        )));
    }
    if sdr.orientation() != hdr.orientation() {
        return Err(ItemError::skipped(format!(
            "orientation mismatch: HDR {:?}, SDR {:?}",
            hdr.orientation(),
            sdr.orientation()
        )));
    }
    if sdr.display_dimensions() != hdr.display_dimensions() {
        let (hw, hh) = hdr.display_dimensions();
        let (sw, sh) = sdr.display_dimensions();
        return Err(ItemError::skipped(format!(
            "size mismatch: HDR {hw}x{hh}, SDR {sw}x{sh}"
        )));
    }
    Ok(())
}

/// Luminance statistics, headroom, clip stats and maker fields.
///
/// Fails when an engine primitive gives no output or the maker fields do
/// not survive validation.
pub fn analyze(
    engine: &dyn Engine,
    config: &PipelineConfig,
    hdr: &Image,
) -> Result<Analysis, ItemError> {
    let stats = LuminanceStats::measure(engine, hdr)?;
    let headroom = headroom::estimate(engine, &stats, config.headroom(), config.bin_count)?;

    // the tone-mapping operating point unless overridden
    let clip_threshold = config.clip_threshold.unwrap_or(headroom.headroom_ratio);
    let hist = stats.histogram(engine, config.bin_count)?;
    let clip = clip::fraction_above(
        &hist,
        stats.abs_max(),
        clip_threshold,
        clip::pixel_count(hdr),
    );

    let solution = maker::from_headroom(headroom.pic_headroom)?;
    let validation = maker::check(solution.headroom, &solution.default)?;

    Ok(Analysis {
        abs_max: stats.abs_max(),
        headroom,
        maker: solution,
        validation,
        clip_threshold,
        clip,
    })
}

/// Attributes embedding the maker fields.
pub fn maker_attrs(solution: &MakerSolution) -> Attrs {
    let mut attrs = Attrs::new();
    attrs.set(keys::MAKER_33, AttrValue::Double(solution.default.field33));
    attrs.set(keys::MAKER_48, AttrValue::Double(solution.default.field48));
    attrs.set(keys::HEADROOM_STOPS, AttrValue::Double(solution.stops));
    attrs.set(
        keys::SOFTWARE,
        AttrValue::Str(concat!("gainmap ", env!("CARGO_PKG_VERSION")).to_string()),
    );
    attrs
}

/// Runs the whole pipeline for one item.
pub fn process_item(
    engine: &dyn Engine,
    config: &PipelineConfig,
    item: &WorkItem,
    sink: &dyn ProgressSink,
) -> Result<ItemReport, ItemError> {
    let _span = info_span!("item", name = %item.name).entered();

    if config.skip_existing && item.destination.exists() {
        return Err(ItemError::skipped("output exists"));
    }

    let hdr = gainmap_io::read(&item.hdr_path)
        .map_err(|e| ItemError::failed(format!("Cannot read HDR: {e}")))?;
    let sdr = match &item.sdr_path {
        Some(path) => Some(
            gainmap_io::read(path).map_err(|e| ItemError::failed(format!("Cannot read SDR: {e}")))?,
        ),
        None => None,
    };
    check_preconditions(&hdr, sdr.as_ref())?;

    let analysis = analyze(engine, config, &hdr)?;
    sink.log(
        &item.name,
        &format!(
            "headroom {:.3} (ratio {:.3}), maker {}/{:.5} branch {}",
            analysis.headroom.pic_headroom,
            analysis.headroom.headroom_ratio,
            analysis.maker.default.field33,
            analysis.maker.default.field48,
            analysis.maker.default.branch
        ),
    );

    let base = match sdr {
        Some(sdr) => sdr,
        None => engine.tone_map(&hdr, analysis.headroom.headroom_ratio as f32, 1.0)?,
    };

    let clip = &analysis.clip;
    sink.log(
        &item.name,
        &format!(
            "clip {:.3}% above {:.3} ({} of {} px)",
            clip.fraction * 100.0,
            analysis.clip_threshold,
            clip.clipped_pixel_count,
            clip.total_pixel_count
        ),
    );
    if config.clip_overlay {
        write_overlay(&hdr, &base, analysis.clip_threshold, &item.overlay_path())?;
    }

    let verifier = EncodeVerifier::from_config(engine, config);
    let encode = verifier.encode(&base, &hdr, &maker_attrs(&analysis.maker), &item.destination)?;
    sink.log(
        &item.name,
        &format!("written with {} ({} attempt(s))", encode.strategy, encode.attempts),
    );

    Ok(ItemReport { analysis, encode })
}

fn write_overlay(hdr: &Image, base: &Image, threshold: f64, path: &Path) -> Result<(), ItemError> {
    let mask = clip::build_clip_mask(hdr, threshold as f32);
    let overlay = clip::apply_mask_overlay(base, &mask, clip::OVERLAY_RED)?;
    gainmap_io::png::write(path, &overlay)
        .map_err(|e| ItemError::failed(format!("Cannot write clip overlay: {e}")))?;
    debug!(path = %path.display(), "clip overlay written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gainmap_core::{ColorSpaceId, Orientation};

    fn hdr(w: u32, h: u32) -> Image {
        Image::filled(w, h, [2.0, 2.0, 2.0, 1.0], ColorSpaceId::LinearSrgb)
    }

    #[test]
    fn test_preconditions() {
        assert!(check_preconditions(&hdr(4, 2), None).is_ok());

        let xyz = hdr(4, 2).with_color_space(ColorSpaceId::CieXyz);
        assert!(check_preconditions(&xyz, None).unwrap_err().is_skip());

        let sdr = Image::filled(4, 2, [0.5; 4], ColorSpaceId::Srgb);
        assert!(check_preconditions(&hdr(4, 2), Some(&sdr)).is_ok());

        let wrong_size = Image::filled(2, 4, [0.5; 4], ColorSpaceId::Srgb);
        let err = check_preconditions(&hdr(4, 2), Some(&wrong_size)).unwrap_err();
        assert!(err.reason().starts_with("size mismatch"));

        let rotated = sdr.with_orientation(Orientation::Rotate90);
        let err = check_preconditions(&hdr(4, 2), Some(&rotated)).unwrap_err();
        assert!(err.reason().starts_with("orientation mismatch"));

        let linear_sdr = sdr.with_color_space(ColorSpaceId::LinearSrgb);
        assert!(check_preconditions(&hdr(4, 2), Some(&linear_sdr)).unwrap_err().is_skip());
    }

    #[test]
    fn test_maker_attrs() {
        let solution = maker::from_headroom(2.0).unwrap();
        let attrs = maker_attrs(&solution);
        assert_eq!(attrs.get(keys::MAKER_33).and_then(|v| v.as_f64()), Some(1.0));
        assert_eq!(
            attrs.get(keys::MAKER_48).and_then(|v| v.as_f64()),
            Some(solution.default.field48)
        );
    }

    #[test]
    fn test_maker_fields_carry_measured_peak() {
        let engine = gainmap_engine::CpuEngine::new();
        let flat = Image::filled(8, 8, [4.0, 4.0, 4.0, 1.0], ColorSpaceId::LinearSrgb);
        let analysis = analyze(&engine, &PipelineConfig::default(), &flat).unwrap();

        assert_relative_eq!(analysis.headroom.pic_headroom, 4.0, epsilon = 1e-5);
        assert!(analysis.headroom.headroom_ratio < 4.0);
        assert_relative_eq!(analysis.maker.headroom, 4.0, epsilon = 1e-5);
        assert_relative_eq!(analysis.maker.stops, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_clip_threshold_defaults_to_headroom_ratio() {
        let engine = gainmap_engine::CpuEngine::new();
        // left half at SDR white, right half at the peak
        let rgb: Vec<f32> = (0..16u32)
            .flat_map(|i| if i % 4 < 2 { [1.0; 3] } else { [4.0; 3] })
            .collect();
        let image = Image::from_rgb(4, 4, &rgb, ColorSpaceId::LinearSrgb).unwrap();

        let analysis = analyze(&engine, &PipelineConfig::default(), &image).unwrap();
        assert_eq!(analysis.clip_threshold, analysis.headroom.headroom_ratio);
        assert_eq!(analysis.clip.total_pixel_count, 16);
        assert_relative_eq!(analysis.clip.fraction, 0.5, epsilon = 0.01);

        let config = PipelineConfig {
            clip_threshold: Some(0.5),
            ..Default::default()
        };
        let overridden = analyze(&engine, &config, &image).unwrap();
        assert_eq!(overridden.clip_threshold, 0.5);
        assert!(overridden.clip.fraction > analysis.clip.fraction);
    }

    #[test]
    fn test_overlay_path() {
        let item = WorkItem::new("in/a.hdr", "out/a.gmap");
        assert_eq!(item.name, "a.hdr");
        assert_eq!(item.overlay_path(), PathBuf::from("out/a.clip.png"));
    }
}
