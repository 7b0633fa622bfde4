//! End-to-end properties of the luminance, headroom, maker and clip stages
//! running on the CPU engine.

use approx::assert_relative_eq;
use gainmap_core::{ColorSpaceId, Image};
use gainmap_engine::CpuEngine;
use gainmap_ops::{HeadroomPolicy, LuminanceStats, clip, headroom, maker};

fn scene(peak: f32) -> Image {
    let (w, h) = (64u32, 32u32);
    let rgb: Vec<f32> = (0..w * h)
        .flat_map(|i| {
            let x = (i % w) as f32 / (w - 1) as f32;
            let v = x * x * peak;
            [v, v * 0.9, v * 0.8]
        })
        .collect();
    Image::from_rgb(w, h, &rgb, ColorSpaceId::LinearSrgb).unwrap()
}

fn run(image: &Image, policy: HeadroomPolicy) -> (maker::MakerCandidate, clip::ClipStats) {
    let engine = CpuEngine::new();
    let stats = LuminanceStats::measure(&engine, image).unwrap();
    let result = headroom::estimate(&engine, &stats, policy, 1024).unwrap();
    let solution = maker::from_headroom(result.pic_headroom).unwrap();
    maker::check(solution.headroom, &solution.default).unwrap();

    let hist = stats.histogram(&engine, 1024).unwrap();
    let clipped = clip::fraction_above(&hist, stats.abs_max(), 1.0, clip::pixel_count(image));
    (solution.default, clipped)
}

#[test]
fn max_policy_matches_closed_form() {
    let engine = CpuEngine::new();
    let image = scene(4.0);
    let stats = LuminanceStats::measure(&engine, &image).unwrap();
    let result = headroom::estimate(&engine, &stats, HeadroomPolicy::default(), 256).unwrap();
    let h = stats.abs_max();
    assert_relative_eq!(result.pic_headroom, h);
    assert_relative_eq!(result.headroom_ratio, 1.0 + h - h.powf(0.2), epsilon = 1e-12);
}

#[test]
fn percentile_policy_tracks_peak() {
    let engine = CpuEngine::new();
    let image = scene(6.0);
    let stats = LuminanceStats::measure(&engine, &image).unwrap();
    let result = headroom::estimate(
        &engine,
        &stats,
        HeadroomPolicy::Percentile { percentile: 100.0 },
        512,
    )
    .unwrap();
    assert!((result.pic_headroom - stats.abs_max()).abs() <= stats.abs_max() / 512.0);
}

#[test]
fn black_image_has_no_headroom() {
    let engine = CpuEngine::new();
    let image = Image::filled(8, 8, [0.0, 0.0, 0.0, 1.0], ColorSpaceId::LinearSrgb);
    let stats = LuminanceStats::measure(&engine, &image).unwrap();
    for policy in [
        HeadroomPolicy::default(),
        HeadroomPolicy::Percentile { percentile: 99.5 },
    ] {
        let result = headroom::estimate(&engine, &stats, policy, 1024).unwrap();
        assert_eq!(result.headroom_ratio, 1.0);
        assert_eq!(result.pic_headroom, 1.0);
    }
}

#[test]
fn repeated_runs_are_bit_identical() {
    let image = scene(5.0);
    for policy in [
        HeadroomPolicy::default(),
        HeadroomPolicy::Percentile { percentile: 99.0 },
    ] {
        let (a_fields, a_clip) = run(&image, policy);
        let (b_fields, b_clip) = run(&image, policy);
        assert_eq!(a_fields.field33.to_bits(), b_fields.field33.to_bits());
        assert_eq!(a_fields.field48.to_bits(), b_fields.field48.to_bits());
        assert_eq!(a_clip, b_clip);
    }
}

#[test]
fn clip_fraction_matches_pixel_share() {
    let engine = CpuEngine::new();
    // left half at 0.5, right half at 3.0
    let (w, h) = (16u32, 4u32);
    let rgb: Vec<f32> = (0..w * h)
        .flat_map(|i| {
            let v = if i % w < w / 2 { 0.5 } else { 3.0 };
            [v, v, v]
        })
        .collect();
    let image = Image::from_rgb(w, h, &rgb, ColorSpaceId::LinearSrgb).unwrap();
    let stats = LuminanceStats::measure(&engine, &image).unwrap();
    let hist = stats.histogram(&engine, 256).unwrap();
    let clipped = clip::fraction_above(&hist, stats.abs_max(), 1.0, clip::pixel_count(&image));
    assert_relative_eq!(clipped.fraction, 0.5, epsilon = 1e-6);
    assert_eq!(clipped.clipped_pixel_count, 32);
}
