//! chromashade command-line interface
//!
//! `chromashade color` removes seed colors, `chromashade shadow` brightens
//! shadows. Both accept files and directories and write one output per input.

use super::config::{CliConfigBuilder, SeedSpec};
use crate::{
    config::{EncodeOptions, Preset},
    processor::EditSession,
    services::{ImageIOService, OutputFormatHandler},
    tracing_config::{events, init_cli_tracing, spans},
    types::{BitMask, RenderResult},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Color removal and shadow correction for images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "chromashade")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Make pixels matching seed colors transparent
    Color(ColorArgs),
    /// Brighten shadowed regions
    Shadow(ShadowArgs),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Color(_) => "color",
            Self::Shadow(_) => "shadow",
        }
    }

    fn common(&self) -> &CommonArgs {
        match self {
            Self::Color(args) => &args.common,
            Self::Shadow(args) => &args.common,
        }
    }
}

/// Arguments shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<String>,

    /// Output file (single input) or directory (several inputs)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format [default: from the output extension, the preset, or png]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (0-100)
    #[arg(long)]
    pub quality: Option<u8>,

    /// JSON preset with color, shadow and output sections
    #[arg(long, value_name = "PRESET")]
    pub config: Option<PathBuf>,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directory inputs (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ColorArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Seed color: global:R,G,B, global@X,Y or local@X,Y (repeatable)
    #[arg(long = "seed", value_name = "SPEC")]
    pub seeds: Vec<String>,

    /// Detect the background color from the image border
    #[arg(long)]
    pub auto: bool,

    /// Matching tolerance as an RGB distance (0-442)
    #[arg(short, long)]
    pub tolerance: Option<f32>,

    /// Keep hard edges (skip alpha feathering)
    #[arg(long)]
    pub no_refine: bool,

    /// Edge feathering strength (0-100)
    #[arg(long)]
    pub refine_strength: Option<f32>,
}

#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct ShadowArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Correction strength (0-100)
    #[arg(short, long)]
    pub strength: Option<f32>,

    /// Preference for dark, flat regions (0-100)
    #[arg(short, long)]
    pub bias: Option<f32>,

    /// Use the milder non-aggressive gain caps
    #[arg(long)]
    pub gentle: bool,

    /// Raise all gain caps and lower the output gamma
    #[arg(long)]
    pub extreme: bool,

    /// Target luminance (0-1) corrected pixels are lifted toward
    #[arg(long, value_name = "F")]
    pub target: Option<f32>,

    /// Black/white image marking regions to treat as shadow
    #[arg(long, value_name = "PATH")]
    pub mask: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Webp,
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let session_id = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;
    let _session = spans::session(&session_id, cli.command.name()).entered();

    let files = collect_inputs(cli.command.common())?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }
    info!("Found {} image file(s) to process", files.len());

    let processed = match &cli.command {
        Command::Color(args) => run_color(args, &files)?,
        Command::Shadow(args) => run_shadow(args, &files)?,
    };
    info!("Processed {} of {} file(s)", processed, files.len());
    Ok(())
}

fn run_color(args: &ColorArgs, files: &[PathBuf]) -> Result<usize> {
    let preset = CliConfigBuilder::load_preset(&args.common)?;
    let config = CliConfigBuilder::color_config(args, &preset)?;
    let seeds = CliConfigBuilder::parse_seeds(args)?;
    if seeds.is_empty() && !args.auto {
        events::warning_with_recommendation(
            "No seeds given; outputs will equal their inputs",
            "pass --seed SPEC or --auto",
        );
    }

    process_files(&args.common, files, "color", &preset, |path| {
        let raster = ImageIOService::load_raster(path)?;
        let mut session = EditSession::new(raster).with_color_config(config);
        if args.auto && session.auto_detect().is_none() {
            warn!("No opaque border pixels in {}; auto detection skipped", path.display());
        }
        for spec in &seeds {
            spec.apply(&mut session);
        }
        Ok(session.render_color_removal()?)
    })
}

fn run_shadow(args: &ShadowArgs, files: &[PathBuf]) -> Result<usize> {
    let preset = CliConfigBuilder::load_preset(&args.common)?;
    let config = CliConfigBuilder::shadow_config(args, &preset)?;
    let mask: Option<BitMask> = args
        .mask
        .as_deref()
        .map(ImageIOService::load_mask)
        .transpose()
        .context("Failed to load shadow mask")?;

    process_files(&args.common, files, "shadow", &preset, |path| {
        let raster = ImageIOService::load_raster(path)?;
        let mut session = EditSession::new(raster).with_shadow_config(config);
        session.set_shadow_mask(mask.clone())?;
        Ok(session.render_shadow_correction()?)
    })
}

/// Render and save every file, continuing past failures
fn process_files<F>(
    common: &CommonArgs,
    files: &[PathBuf],
    suffix: &str,
    preset: &Preset,
    render: F,
) -> Result<usize>
where
    F: Fn(&Path) -> Result<RenderResult>,
{
    let single_output = (files.len() == 1).then(|| common.output.as_deref().map(Path::new)).flatten();
    let options = CliConfigBuilder::encode_options(common, preset, single_output);
    if suffix == "color" {
        OutputFormatHandler::warn_if_opaque(options.format);
    }
    let output_dir = prepare_output_dir(common, files.len())?;

    let _batch = spans::batch_processing(files.len()).entered();
    let progress = if files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let mut processed = 0;
    let mut failed = 0;
    for input in files {
        if let Some(pb) = &progress {
            pb.set_message(format!("{}", input.display()));
        }
        let output = match (&single_output, &output_dir) {
            (Some(path), _) => path.to_path_buf(),
            (None, Some(dir)) => output_path_in_dir(input, dir, suffix, &options),
            (None, None) => output_path(input, suffix, &options),
        };

        let _file = spans::file_processing(input, suffix).entered();
        match process_one(input, &output, &options, &render) {
            Ok(()) => processed += 1,
            Err(e) => {
                failed += 1;
                events::error_with_context(&format!("{:#}", e), &input.display().to_string());
            },
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    info!(
        "Batch finished in {:.2}s: {} succeeded, {} failed",
        start.elapsed().as_secs_f64(),
        processed,
        failed
    );
    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed", failed, files.len());
    }
    Ok(processed)
}

fn process_one<F>(input: &Path, output: &Path, options: &EncodeOptions, render: &F) -> Result<()>
where
    F: Fn(&Path) -> Result<RenderResult>,
{
    let result = render(input).with_context(|| format!("Failed to render {}", input.display()))?;
    ImageIOService::save_raster(&result.raster, output, options)
        .with_context(|| format!("Failed to save {}", output.display()))?;
    events::render_summary(output, &result.metadata);
    Ok(())
}

fn prepare_output_dir(common: &CommonArgs, file_count: usize) -> Result<Option<PathBuf>> {
    let Some(output) = common.output.as_ref().filter(|_| file_count > 1) else {
        return Ok(None);
    };
    let dir = PathBuf::from(output);
    if dir.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            dir.display()
        );
    }
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(Some(dir))
}

/// Expand file and directory inputs into a sorted list of image files
fn collect_inputs(common: &CommonArgs) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in &common.input {
        let path = PathBuf::from(input);
        if path.is_file() {
            if ImageIOService::is_supported_format(&path) {
                files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            files.extend(find_image_files(&path, common.recursive, common.pattern.as_deref())?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let pattern = pattern
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid --pattern")?;
    let depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(depth) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let name_matches = match (&pattern, path.file_name().and_then(|n| n.to_str())) {
            (Some(p), Some(name)) => p.matches(name),
            (Some(_), None) => false,
            (None, _) => true,
        };
        if name_matches && ImageIOService::is_supported_format(path) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn output_file_name(input: &Path, suffix: &str, options: &EncodeOptions) -> String {
    let stem = input.file_stem().unwrap_or_default();
    format!(
        "{}_{}.{}",
        stem.to_string_lossy(),
        suffix,
        OutputFormatHandler::get_extension(options.format)
    )
}

/// `<dir>/<stem>_<suffix>.<ext>` next to the input
fn output_path(input: &Path, suffix: &str, options: &EncodeOptions) -> PathBuf {
    let dir = input.parent().unwrap_or(Path::new("."));
    dir.join(output_file_name(input, suffix, options))
}

fn output_path_in_dir(input: &Path, dir: &Path, suffix: &str, options: &EncodeOptions) -> PathBuf {
    dir.join(output_file_name(input, suffix, options))
}
