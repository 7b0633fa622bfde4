//! gainmap - batch HDR to gain map converter
//!
//! Turns linear HDR images into SDR base images carrying a verified gain
//! map plus maker headroom fields.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use gainmap_pipeline::{EncoderChoice, HeadroomMode};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "gainmap")]
#[command(author, version, about = "Batch HDR to gain map converter")]
#[command(long_about = "
Converts linear HDR images into SDR images with an embedded gain map.
Each output carries maker headroom fields derived from the image's
luminance statistics and is re-read to verify the gain map survived.

Examples:
  gainmap convert shots/ -o out/                 # Every .hdr in shots/
  gainmap convert 'shots/*_v2.hdr' -o out/ -j 4
  gainmap convert shots/ -o out/ --sdr-dir graded/
  gainmap convert shots/ -o out/ --policy percentile --percentile 99.5
  gainmap convert shots/ -o out/ --clip-threshold 1.0 --clip-overlay
  gainmap analyze shot.hdr                       # Headroom and maker fields
  gainmap inspect out/shot.gmap                  # Container contents
  RUST_LOG=gainmap_pipeline=debug gainmap convert shots/ -o out/
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of worker threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert HDR images to gain map containers
    #[command(visible_alias = "c")]
    Convert(ConvertArgs),

    /// Print headroom, maker fields and clip stats for HDR images
    #[command(visible_alias = "a")]
    Analyze(AnalyzeArgs),

    /// Print the contents of gain map containers
    #[command(visible_alias = "i")]
    Inspect(InspectArgs),
}

/// Options shared by every command that runs the analysis.
#[derive(Args, Clone, Default)]
struct PipelineArgs {
    /// YAML config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Headroom policy (percentile, max)
    #[arg(long)]
    policy: Option<HeadroomMode>,

    /// Percentile for the percentile policy, in (0, 100]
    #[arg(long)]
    percentile: Option<f64>,

    /// Tone map ratio for the max policy, in [0, 1]
    #[arg(long)]
    tonemap_ratio: Option<f64>,

    /// Luminance histogram bins (1-2048)
    #[arg(long)]
    bins: Option<usize>,

    /// Clip threshold in linear units; enables clip diagnostics
    #[arg(long)]
    clip_threshold: Option<f64>,
}

#[derive(Args)]
struct ConvertArgs {
    /// Input directory (every .hdr inside) or glob pattern
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Directory of pre-graded SDR PNGs, paired by file stem
    #[arg(long)]
    sdr_dir: Option<PathBuf>,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Base image quality in [0, 1]
    #[arg(short, long)]
    quality: Option<f32>,

    /// Encoder strategy (auto, legacy, 10bit)
    #[arg(short, long)]
    strategy: Option<EncoderChoice>,

    /// Skip re-reading outputs to verify the gain map
    #[arg(long)]
    no_verify: bool,

    /// Write a red clip overlay next to each output
    #[arg(long)]
    clip_overlay: bool,

    /// Leave items whose output already exists
    #[arg(long)]
    skip_existing: bool,

    /// Gain map downscale factor
    #[arg(long)]
    gain_map_scale: Option<u32>,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// HDR input file(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args)]
struct InspectArgs {
    /// Gain map container(s)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Also list every metadata attribute
    #[arg(short, long)]
    all: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Convert(args) => commands::convert::run(args, cli.threads, cli.verbose),
        Commands::Analyze(args) => commands::analyze::run(args, cli.verbose),
        Commands::Inspect(args) => commands::inspect::run(args, cli.verbose),
    }
}
