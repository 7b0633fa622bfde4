//! CLI command implementations

pub mod analyze;
pub mod convert;
pub mod inspect;

use crate::PipelineArgs;
use anyhow::{Context, Result};
use gainmap_core::Image;
use gainmap_pipeline::{PipelineConfig, PipelineError};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Load image from path
pub fn load_image(path: &Path) -> Result<Image> {
    gainmap_io::read(path).with_context(|| format!("Failed to load: {}", path.display()))
}

/// Config from `--config` (or defaults) with flag overrides applied.
pub fn build_config(args: &PipelineArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_yaml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(policy) = args.policy {
        config.headroom_policy = policy;
    }
    if let Some(p) = args.percentile {
        config.percentile = p;
    }
    if let Some(r) = args.tonemap_ratio {
        config.tonemap_ratio = r;
    }
    if let Some(bins) = args.bins {
        config.bin_count = bins;
    }
    if args.clip_threshold.is_some() {
        config.clip_threshold = args.clip_threshold;
    }
    Ok(config)
}

/// HDR inputs named by a directory or a glob pattern, sorted.
///
/// A directory contributes every `*.hdr` directly inside it. Anything that
/// is neither an existing directory, an existing file nor a pattern is a
/// missing input directory.
pub fn discover_inputs(input: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(input);
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };

    let mut files: Vec<PathBuf> = if path.is_dir() {
        let pattern = Path::new(&glob::Pattern::escape(input)).join("*.hdr");
        glob::glob_with(&pattern.to_string_lossy(), options)?
            .filter_map(|r| r.ok())
            .collect()
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else if is_pattern(input) {
        glob::glob_with(input, options)?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect()
    } else {
        return Err(PipelineError::InputDirMissing(path.to_path_buf()).into());
    };

    files.sort();
    Ok(files)
}

fn is_pattern(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Creates the output directory and proves it accepts new files.
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    let unwritable = |source: std::io::Error| PipelineError::OutputDirUnwritable {
        path: dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(unwritable)?;
    tempfile::tempfile_in(dir).map_err(unwritable)?;
    Ok(())
}

/// `<sdr_dir>/<stem>.png` when it exists.
pub fn paired_sdr(sdr_dir: &Path, hdr: &Path) -> Option<PathBuf> {
    let candidate = sdr_dir.join(with_suffix(hdr.file_stem()?, "png"));
    candidate.is_file().then_some(candidate)
}

/// Output container path for an HDR input.
pub fn destination(output_dir: &Path, hdr: &Path) -> PathBuf {
    let stem = hdr.file_stem().unwrap_or(OsStr::new("output"));
    output_dir.join(with_suffix(stem, "gmap"))
}

fn with_suffix(stem: &OsStr, ext: &str) -> OsString {
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(ext);
    name
}
