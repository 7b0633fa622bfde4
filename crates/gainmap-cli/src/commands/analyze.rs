//! Headroom analysis command.
//!
//! Runs the measurement half of the pipeline and prints what a conversion
//! would embed, without writing anything.

use crate::AnalyzeArgs;
use anyhow::{Result, bail};
use gainmap_engine::CpuEngine;
use gainmap_pipeline::item::{self, Analysis};
use std::path::Path;
use tracing::warn;

pub fn run(args: AnalyzeArgs, verbose: u8) -> Result<()> {
    let config = super::build_config(&args.pipeline)?;
    config.validate()?;
    let engine = CpuEngine::new();

    let mut failed = 0;
    for path in &args.input {
        let image = super::load_image(path)?;
        let outcome = item::check_preconditions(&image, None)
            .and_then(|()| item::analyze(&engine, &config, &image));
        match outcome {
            Ok(analysis) => print_analysis(path, &analysis, verbose),
            Err(e) => {
                warn!(path = %path.display(), "{e}");
                eprintln!("{}: {e}", path.display());
                failed += 1;
            }
        }

        if args.input.len() > 1 {
            println!();
        }
    }

    if failed > 0 {
        bail!("{failed} file(s) could not be analyzed");
    }
    Ok(())
}

fn print_analysis(path: &Path, a: &Analysis, verbose: u8) {
    let default = &a.maker.default;
    println!("{}", path.display());
    println!("  Peak luma:      {:.4}", a.abs_max);
    println!("  Pic headroom:   {:.4}", a.headroom.pic_headroom);
    println!("  Headroom ratio: {:.4}", a.headroom.headroom_ratio);
    println!("  Stops:          {:.4}", a.maker.stops);
    println!(
        "  Maker fields:   33={} 48={:.6} (branch {})",
        default.field33, default.field48, default.branch
    );
    println!(
        "  Round trip:     {:.4} stops, {:.3}% headroom",
        a.validation.abs_stops_diff,
        a.validation.rel_headroom_diff * 100.0
    );

    if verbose > 0 || a.maker.candidates.len() > 1 {
        println!("  Candidates:");
        for c in &a.maker.candidates {
            let mark = if c == default { "*" } else { " " };
            println!(
                "   {mark} {}: 33={} 48={:.6}",
                c.branch, c.field33, c.field48
            );
        }
    }

    println!(
        "  Clipped:        {:.3}% above {:.3} ({} of {} px)",
        a.clip.fraction * 100.0,
        a.clip_threshold,
        a.clip.clipped_pixel_count,
        a.clip.total_pixel_count
    );
}

