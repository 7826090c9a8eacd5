//! Conversion from CLI arguments to engine configuration

use crate::cli::main_impl::{CliOutputFormat, ColorArgs, CommonArgs, ShadowArgs};
use crate::{
    config::{ColorRemovalConfig, EncodeOptions, OutputFormat, Preset, ShadowConfig},
    processor::EditSession,
    segmentation::ColorSeed,
    services::OutputFormatHandler,
};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// A `--seed` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SeedSpec {
    /// `global:R,G,B`
    GlobalColor([u8; 3]),
    /// `global@X,Y`, color sampled from the image
    GlobalAt(i64, i64),
    /// `local@X,Y`, flood fill from the point
    LocalAt(i64, i64),
}

fn parse_triplet(s: &str) -> Result<[u8; 3]> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        bail!("expected R,G,B but got '{}'", s);
    }
    let mut rgb = [0u8; 3];
    for (c, part) in rgb.iter_mut().zip(&parts) {
        *c = part
            .parse()
            .with_context(|| format!("'{}' is not a channel value in 0-255", part))?;
    }
    Ok(rgb)
}

fn parse_point(s: &str) -> Result<(i64, i64)> {
    let (x, y) = s
        .split_once(',')
        .with_context(|| format!("expected X,Y but got '{}'", s))?;
    let x = x.trim().parse().with_context(|| format!("invalid x coordinate '{}'", x))?;
    let y = y.trim().parse().with_context(|| format!("invalid y coordinate '{}'", y))?;
    Ok((x, y))
}

impl SeedSpec {
    pub(crate) fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if let Some(rest) = spec.strip_prefix("global:") {
            Ok(Self::GlobalColor(parse_triplet(rest)?))
        } else if let Some(rest) = spec.strip_prefix("global@") {
            let (x, y) = parse_point(rest)?;
            Ok(Self::GlobalAt(x, y))
        } else if let Some(rest) = spec.strip_prefix("local@") {
            let (x, y) = parse_point(rest)?;
            Ok(Self::LocalAt(x, y))
        } else {
            bail!(
                "invalid seed '{}' (expected global:R,G,B, global@X,Y or local@X,Y)",
                spec
            )
        }
    }

    /// Add the seed to a session; point seeds sample the session's image
    pub(crate) fn apply(self, session: &mut EditSession) -> ColorSeed {
        match self {
            Self::GlobalColor(rgb) => {
                let seed = ColorSeed::global(rgb).with_tolerance(session.color_config().tolerance);
                session.push_seed(seed);
                seed
            },
            Self::GlobalAt(x, y) => session.pick_global(x, y),
            Self::LocalAt(x, y) => session.pick_local(x, y),
        }
    }
}

/// Builds engine configuration from a preset overlaid with CLI flags
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    pub(crate) fn load_preset(common: &CommonArgs) -> Result<Preset> {
        match &common.config {
            Some(path) => Preset::from_json_file(path)
                .with_context(|| format!("Failed to load preset {}", path.display())),
            None => Ok(Preset::default()),
        }
    }

    pub(crate) fn color_config(args: &ColorArgs, preset: &Preset) -> Result<ColorRemovalConfig> {
        let base = preset.color;
        ColorRemovalConfig::builder()
            .tolerance(args.tolerance.unwrap_or(base.tolerance))
            .auto_refine(base.auto_refine && !args.no_refine)
            .refine_strength(args.refine_strength.unwrap_or(base.refine_strength))
            .build()
            .context("Invalid color removal parameters")
    }

    pub(crate) fn shadow_config(args: &ShadowArgs, preset: &Preset) -> Result<ShadowConfig> {
        let base = preset.shadow;
        ShadowConfig::builder()
            .strength(args.strength.unwrap_or(base.strength))
            .bias(args.bias.unwrap_or(base.bias))
            .aggressive(base.aggressive && !args.gentle)
            .extreme(base.extreme || args.extreme)
            .target_brightness(args.target.or(base.target_brightness))
            .build()
            .context("Invalid shadow parameters")
    }

    /// `--format` wins, then a single output file's extension, then the preset
    pub(crate) fn encode_options(common: &CommonArgs, preset: &Preset, single_output: Option<&Path>) -> EncodeOptions {
        let format = match common.format {
            Some(f) => f.into(),
            None => single_output
                .and_then(OutputFormatHandler::from_path)
                .unwrap_or(preset.output.format),
        };
        EncodeOptions {
            format,
            jpeg_quality: common.quality.unwrap_or(preset.output.jpeg_quality).min(100),
        }
    }

    pub(crate) fn parse_seeds(args: &ColorArgs) -> Result<Vec<SeedSpec>> {
        args.seeds.iter().map(|s| SeedSpec::parse(s)).collect()
    }
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            CliOutputFormat::Webp => Self::WebP,
        }
    }
}
