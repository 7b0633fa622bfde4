//! Encode verifier fallback paths, driven by an engine that misbehaves on
//! chosen strategies.

use gainmap_core::metadata::keys;
use gainmap_core::{AttrValue, Attrs, ColorSpaceId, Image};
use gainmap_engine::{AuxImage, ContainerRequest, CpuEngine, Engine, EngineError, EngineResult};
use gainmap_io::{EncoderStrategy, GainMap, container};
use gainmap_pipeline::encode::GAIN_MAP_MISSING;
use gainmap_pipeline::{EncodeVerifier, ItemError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// CPU engine that drops the gain map or errors for selected strategies on
/// final writes. Intermediate writes (HDR aux) are never touched.
struct FlakyEngine {
    inner: CpuEngine,
    drop_gain_map: Vec<EncoderStrategy>,
    fail_write: Vec<EncoderStrategy>,
    final_writes: AtomicUsize,
}

impl FlakyEngine {
    fn new(drop_gain_map: Vec<EncoderStrategy>, fail_write: Vec<EncoderStrategy>) -> Self {
        Self {
            inner: CpuEngine::new(),
            drop_gain_map,
            fail_write,
            final_writes: AtomicUsize::new(0),
        }
    }
}

impl Engine for FlakyEngine {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn render_luma(&self, image: &Image, weights: [f32; 3]) -> Image {
        self.inner.render_luma(image, weights)
    }

    fn reduce_max(&self, image: &Image) -> Option<[f32; 4]> {
        self.inner.reduce_max(image)
    }

    fn reduce_histogram(&self, image: &Image, bins: usize) -> Option<Vec<[f32; 4]>> {
        self.inner.reduce_histogram(image, bins)
    }

    fn tone_map(&self, hdr: &Image, source: f32, target: f32) -> EngineResult<Image> {
        self.inner.tone_map(hdr, source, target)
    }

    fn write_container(&self, request: &ContainerRequest<'_>, path: &Path) -> EngineResult<()> {
        if !matches!(request.aux, Some(AuxImage::GainMap(_))) {
            return self.inner.write_container(request, path);
        }
        self.final_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_write.contains(&request.strategy) {
            return Err(EngineError::OperationFailed(format!(
                "{} writer crashed",
                request.strategy
            )));
        }
        if self.drop_gain_map.contains(&request.strategy) {
            let mut stripped = request.clone();
            stripped.aux = None;
            return self.inner.write_container(&stripped, path);
        }
        self.inner.write_container(request, path)
    }

    fn read_aux_gain_map(&self, path: &Path) -> EngineResult<Option<GainMap>> {
        self.inner.read_aux_gain_map(path)
    }
}

fn inputs() -> (Image, Image, Attrs) {
    let rgb: Vec<f32> = (0..16 * 8)
        .flat_map(|i| {
            let v = (i % 16) as f32 * 0.25;
            [v, v, v]
        })
        .collect();
    let hdr = Image::from_rgb(16, 8, &rgb, ColorSpaceId::LinearSrgb).unwrap();
    let sdr = CpuEngine::new().tone_map(&hdr, 3.75, 1.0).unwrap();
    let mut attrs = Attrs::new();
    attrs.set(keys::MAKER_33, AttrValue::Double(1.0));
    attrs.set(keys::MAKER_48, AttrValue::Double(0.005));
    (hdr, sdr, attrs)
}

const BOTH: [EncoderStrategy; 2] = [EncoderStrategy::Legacy, EncoderStrategy::TenBit];

#[test]
fn first_strategy_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("a.gmap");
    let (hdr, sdr, attrs) = inputs();
    let engine = FlakyEngine::new(vec![], vec![]);

    let outcome = EncodeVerifier::new(&engine, BOTH.to_vec())
        .encode(&sdr, &hdr, &attrs, &dest)
        .unwrap();
    assert_eq!(outcome.strategy, EncoderStrategy::Legacy);
    assert_eq!(outcome.attempts, 1);

    let written = container::read(&dest).unwrap();
    assert_eq!(written.strategy, EncoderStrategy::Legacy);
    assert_eq!(
        written.base.metadata().get(keys::MAKER_48).and_then(|v| v.as_f64()),
        Some(0.005)
    );
    // scratch directory is cleaned up
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn missing_gain_map_retries_next_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("b.gmap");
    let (hdr, sdr, attrs) = inputs();
    let engine = FlakyEngine::new(vec![EncoderStrategy::Legacy], vec![]);

    let outcome = EncodeVerifier::new(&engine, BOTH.to_vec())
        .encode(&sdr, &hdr, &attrs, &dest)
        .unwrap();
    assert_eq!(outcome.strategy, EncoderStrategy::TenBit);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(engine.final_writes.load(Ordering::SeqCst), 2);
    assert!(container::read_gain_map(&dest).unwrap().is_some());
}

#[test]
fn write_error_retries_next_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("c.gmap");
    let (hdr, sdr, attrs) = inputs();
    let engine = FlakyEngine::new(vec![], vec![EncoderStrategy::Legacy]);

    let outcome = EncodeVerifier::new(&engine, BOTH.to_vec())
        .encode(&sdr, &hdr, &attrs, &dest)
        .unwrap();
    assert_eq!(outcome.strategy, EncoderStrategy::TenBit);
    assert_eq!(outcome.attempts, 2);
}

#[test]
fn exhausted_strategies_fail_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("d.gmap");
    let (hdr, sdr, attrs) = inputs();
    let engine = FlakyEngine::new(BOTH.to_vec(), vec![]);

    let err = EncodeVerifier::new(&engine, BOTH.to_vec())
        .encode(&sdr, &hdr, &attrs, &dest)
        .unwrap_err();
    assert_eq!(err, ItemError::Failed(GAIN_MAP_MISSING.to_string()));
    assert!(!dest.exists());
}

#[test]
fn last_write_error_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("e.gmap");
    let (hdr, sdr, attrs) = inputs();
    let engine = FlakyEngine::new(vec![], vec![EncoderStrategy::TenBit]);

    let err = EncodeVerifier::new(&engine, vec![EncoderStrategy::TenBit])
        .encode(&sdr, &hdr, &attrs, &dest)
        .unwrap_err();
    assert!(err.reason().contains("writer crashed"), "{err}");
}

#[test]
fn verification_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("f.gmap");
    let (hdr, sdr, attrs) = inputs();
    let engine = FlakyEngine::new(BOTH.to_vec(), vec![]);

    let outcome = EncodeVerifier::new(&engine, BOTH.to_vec())
        .with_verify(false)
        .encode(&sdr, &hdr, &attrs, &dest)
        .unwrap();
    assert_eq!(outcome.attempts, 1);
    assert!(container::read_gain_map(&dest).unwrap().is_none());
}
