//! Batch conversion command

use crate::ConvertArgs;
use anyhow::{Context, Result, bail};
use gainmap_engine::CpuEngine;
use gainmap_pipeline::{BatchDriver, PipelineConfig, ProgressSink, WorkItem};
use std::path::Path;
use tracing::{debug, info, trace};

/// Prints item lines and progress to stdout when verbose.
struct ConsoleSink {
    verbose: u8,
}

impl ProgressSink for ConsoleSink {
    fn log(&self, item: &str, line: &str) {
        debug!(item, "{line}");
        if self.verbose > 0 {
            println!("{item}: {line}");
        }
    }

    fn advance(&self, done: usize, total: usize) {
        trace!(done, total, "progress");
        if self.verbose > 0 {
            println!("[{done}/{total}]");
        }
    }
}

pub fn run(args: ConvertArgs, threads: usize, verbose: u8) -> Result<()> {
    trace!(input = %args.input, output = %args.output_dir.display(), "convert::run");

    let config = config_for(&args, threads)?;
    let files = super::discover_inputs(&args.input)?;
    if files.is_empty() {
        bail!("No HDR files match: {}", args.input);
    }
    super::prepare_output_dir(&args.output_dir)?;

    let items = work_items(&files, &args.output_dir, args.sdr_dir.as_deref());
    info!(
        files = items.len(),
        paired = items.iter().filter(|i| i.sdr_path.is_some()).count(),
        "Starting conversion"
    );
    if verbose > 0 {
        println!("Found {} HDR files in '{}'", items.len(), args.input);
    }

    let engine = CpuEngine::new();
    let driver = BatchDriver::new(&engine, config).context("Invalid configuration")?;
    let summary = driver.run(&items, &ConsoleSink { verbose })?;

    println!("{summary}");
    if !summary.is_success() {
        bail!("{} of {} items failed", summary.failed.len(), summary.total);
    }
    Ok(())
}

/// Config file and shared flags, then the convert-only flags.
fn config_for(args: &ConvertArgs, threads: usize) -> Result<PipelineConfig> {
    let mut config = super::build_config(&args.pipeline)?;
    if let Some(q) = args.quality {
        config.compression_quality = q;
    }
    if let Some(strategy) = args.strategy {
        config.encoder_strategy = strategy;
    }
    if let Some(scale) = args.gain_map_scale {
        config.gain_map_scale = scale;
    }
    if args.no_verify {
        config.verify_after_write = false;
    }
    if args.clip_overlay {
        config.clip_overlay = true;
    }
    if args.skip_existing {
        config.skip_existing = true;
    }
    if threads > 0 {
        config.max_concurrency = threads;
    }
    Ok(config)
}

fn work_items(files: &[std::path::PathBuf], output_dir: &Path, sdr_dir: Option<&Path>) -> Vec<WorkItem> {
    files
        .iter()
        .map(|hdr| {
            let item = WorkItem::new(hdr, super::destination(output_dir, hdr));
            match sdr_dir.and_then(|dir| super::paired_sdr(dir, hdr)) {
                Some(sdr) => item.with_sdr(sdr),
                None => item,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineArgs;
    use gainmap_pipeline::EncoderChoice;
    use std::path::PathBuf;

    fn args() -> ConvertArgs {
        ConvertArgs {
            input: "in".into(),
            output_dir: PathBuf::from("out"),
            sdr_dir: None,
            pipeline: PipelineArgs::default(),
            quality: None,
            strategy: None,
            no_verify: false,
            clip_overlay: false,
            skip_existing: false,
            gain_map_scale: None,
        }
    }

    #[test]
    fn test_defaults_untouched() {
        let config = config_for(&args(), 0).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_convert_flags() {
        let mut a = args();
        a.quality = Some(0.5);
        a.strategy = Some(EncoderChoice::TenBit);
        a.no_verify = true;
        a.skip_existing = true;
        let config = config_for(&a, 3).unwrap();
        assert_eq!(config.compression_quality, 0.5);
        assert_eq!(config.encoder_strategy, EncoderChoice::TenBit);
        assert!(!config.verify_after_write);
        assert!(config.skip_existing);
        assert_eq!(config.max_concurrency, 3);
    }

    #[test]
    fn test_work_items_pair_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"").unwrap();
        let files = vec![PathBuf::from("in/a.hdr"), PathBuf::from("in/b.hdr")];
        let items = work_items(&files, Path::new("out"), Some(dir.path()));
        assert_eq!(items[0].sdr_path, Some(dir.path().join("a.png")));
        assert_eq!(items[1].sdr_path, None);
        assert_eq!(items[1].destination, Path::new("out").join("b.gmap"));
        assert_eq!(items[1].name, "b.hdr");
    }
}
