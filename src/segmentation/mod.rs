//! Color-based region removal
//!
//! [`ColorSegmenter::segment`] turns an ordered list of [`ColorSeed`]s into a
//! copy of the input raster whose alpha channel is zeroed over the matched
//! regions. RGB channels are never modified. Stages run in a fixed order:
//!
//! 1. global seeds clear every matching pixel in one pass
//! 2. auto seeds clear their match field, whole-field when dominant or
//!    border-connected otherwise
//! 3. manual local seeds clear the whole field on a simple background or
//!    flood fill from their clicked points
//! 4. with global seeds present, the edge band and boundary passes mop up
//!    anti-aliased fringes
//! 5. the alpha mask is feathered unless a whole-field clear ran

mod auto_detect;
mod edge_band;
mod feather;
mod flood;
mod matching;
mod seed;
pub mod tolerance;

pub use auto_detect::detect_background_seed;
pub use feather::{refine_alpha_mask, refine_radii};
pub use seed::{AutoRegion, ColorSeed, SeedKind, SeedList, SvRange};

use crate::cancel::{checkpoint, CancellationToken, ROW_BLOCK};
use crate::color::{hue_delta, Hsv};
use crate::config::ColorRemovalConfig;
use crate::error::Result;
use crate::types::{Raster, CHANNELS};
use instant::Instant;
use matching::{hsv_field, BoundaryMatcher, Matcher};
use rayon::prelude::*;
use tolerance::*;
use tracing::{debug, info, instrument, span, Level};

/// Seeds that share a tolerance and color, with the clicked points of every member
struct SeedGroup<'a> {
    seed: &'a ColorSeed,
    points: Vec<(u32, u32)>,
}

/// Batch seeds by `(rounded tolerance, rgb)`, keeping first-seen order
fn group_seeds<'a>(
    seeds: impl Iterator<Item = &'a ColorSeed>,
    fallback: f32,
    raster: &Raster,
) -> Vec<SeedGroup<'a>> {
    let mut keys = Vec::new();
    let mut groups: Vec<SeedGroup<'a>> = Vec::new();
    for seed in seeds {
        let key = seed.group_key(fallback);
        let slot = match keys.iter().position(|k| *k == key) {
            Some(i) => i,
            None => {
                keys.push(key);
                groups.push(SeedGroup {
                    seed,
                    points: Vec::new(),
                });
                groups.len() - 1
            }
        };
        if let SeedKind::Local { x, y } = seed.kind() {
            groups[slot].points.push(raster.clamp_coordinate(x, y));
        }
    }
    groups
}

/// Zero the alpha of every pixel accepted by `pred`, row block by row block
fn clear_where<F>(
    out: &mut Raster,
    hsv: &[Hsv],
    cancel: Option<&CancellationToken>,
    pred: F,
) -> Result<usize>
where
    F: Fn([u8; 3], Hsv) -> bool + Sync,
{
    let row_px = out.width() as usize;
    let block_bytes = row_px * CHANNELS * ROW_BLOCK;
    let mut cleared = 0usize;
    for (b, block) in out.as_bytes_mut().chunks_mut(block_bytes).enumerate() {
        checkpoint(cancel)?;
        let base = b * row_px * ROW_BLOCK;
        cleared += block
            .par_chunks_mut(CHANNELS)
            .enumerate()
            .map(|(i, px)| {
                if pred([px[0], px[1], px[2]], hsv[base + i]) {
                    px[3] = 0;
                    1
                } else {
                    0
                }
            })
            .sum::<usize>();
    }
    Ok(cleared)
}

/// Zero the alpha of every pixel set in `region`
fn clear_region(out: &mut Raster, region: &[u8]) -> usize {
    let mut cleared = 0;
    for (px, &r) in out.as_bytes_mut().chunks_exact_mut(CHANNELS).zip(region) {
        if r != 0 {
            px[3] = 0;
            cleared += 1;
        }
    }
    cleared
}

/// Fraction of grid samples sharing the seed's hue, used to spot simple backgrounds
fn simple_background_ratio(raster: &Raster, hsv: &[Hsv], seed: &ColorSeed, tolerance: f32) -> f32 {
    let (w, h) = raster.dimensions();
    let step = grid_step(w, h) as usize;
    let hue_tol = hue_window(tolerance, CHECK_HUE_MIN, CHECK_HUE_SLOPE);
    let mut hits = 0usize;
    let mut total = 0usize;
    for y in (0..h).step_by(step) {
        for x in (0..w).step_by(step) {
            if raster.pixel(x, y)[3] <= ALPHA_FLOOR {
                continue;
            }
            let pv = hsv[y as usize * w as usize + x as usize];
            if hue_delta(pv.h, seed.hsv().h) <= hue_tol && pv.s >= CHECK_MIN_SATURATION {
                hits += 1;
            }
            total += 1;
        }
    }
    if total > 0 {
        hits as f32 / total as f32
    } else {
        0.0
    }
}

/// Color removal engine
#[derive(Debug, Clone, Default)]
pub struct ColorSegmenter {
    config: ColorRemovalConfig,
    cancel: Option<CancellationToken>,
}

impl ColorSegmenter {
    /// Create an engine; parameters are clamped into range
    #[must_use]
    pub fn new(config: ColorRemovalConfig) -> Self {
        Self {
            config: config.sanitized(),
            cancel: None,
        }
    }

    /// Abort with [`Cancelled`](crate::ChromaShadeError::Cancelled) once `token` fires
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ColorRemovalConfig {
        &self.config
    }

    /// Remove the regions selected by `seeds` from a copy of `raster`
    ///
    /// An empty seed list returns an identical copy. Only the alpha channel
    /// of the copy is written.
    ///
    /// # Errors
    /// - [`Cancelled`](crate::ChromaShadeError::Cancelled) when the attached token fires
    #[instrument(
        skip_all,
        fields(width = raster.width(), height = raster.height(), seeds = seeds.len())
    )]
    pub fn segment(&self, raster: &Raster, seeds: &[ColorSeed]) -> Result<Raster> {
        if seeds.is_empty() {
            debug!("No seeds, returning input unchanged");
            return Ok(raster.clone());
        }
        let start = Instant::now();
        let cancel = self.cancel.as_ref();
        let tolerance = self.config.tolerance;
        let mut out = raster.clone();
        let hsv = hsv_field(raster);
        checkpoint(cancel)?;

        let globals: Vec<&ColorSeed> = seeds
            .iter()
            .filter(|s| matches!(s.kind(), SeedKind::Global))
            .collect();
        let mut whole_field_cleared = false;

        if !globals.is_empty() {
            let _span = span!(Level::DEBUG, "global_seeds", count = globals.len()).entered();
            let matchers: Vec<Matcher> = globals
                .iter()
                .map(|s| Matcher::for_seed(s, s.effective_tolerance(tolerance)))
                .collect();
            let cleared = clear_where(&mut out, &hsv, cancel, |rgb, pv| {
                matchers.iter().any(|m| m.matches(rgb, pv))
            })?;
            debug!(cleared, "Global seed pass");
        }

        let autos = group_seeds(
            seeds.iter().filter(|s| matches!(s.kind(), SeedKind::Auto(_))),
            tolerance,
            raster,
        );
        for group in &autos {
            whole_field_cleared |= self.apply_auto(&mut out, raster, &hsv, group.seed)?;
        }

        let manuals = group_seeds(
            seeds.iter().filter(|s| matches!(s.kind(), SeedKind::Local { .. })),
            tolerance,
            raster,
        );
        for group in &manuals {
            whole_field_cleared |= self.apply_manual(&mut out, raster, &hsv, group)?;
        }

        if !globals.is_empty() {
            let _span = span!(Level::DEBUG, "edge_cleanup").entered();
            checkpoint(cancel)?;
            if globals.iter().any(|s| !s.is_neutral()) {
                let cleared = edge_band::clear_edge_band(&mut out, &hsv);
                debug!(cleared, "Edge band pass");
            }
            let matchers: Vec<BoundaryMatcher> = globals
                .iter()
                .map(|s| BoundaryMatcher::new(s, s.effective_tolerance(tolerance), tolerance))
                .collect();
            let cleared = edge_band::tighten_boundary(&mut out, &hsv, &matchers);
            debug!(cleared, "Boundary tightening pass");
        }

        if let Some(strength) = self.refine_strength(!globals.is_empty(), whole_field_cleared) {
            let _span = span!(Level::DEBUG, "refine_alpha", strength).entered();
            checkpoint(cancel)?;
            refine_alpha_mask(&mut out, strength);
        }

        info!(
            transparent = out.transparent_count(),
            total = out.pixel_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Color removal complete"
        );
        Ok(out)
    }

    /// Feathering strength, or `None` when a whole-field clear already produced clean edges
    fn refine_strength(&self, has_globals: bool, whole_field_cleared: bool) -> Option<f32> {
        if whole_field_cleared {
            None
        } else if self.config.auto_refine {
            Some(self.config.refine_strength.max(MIN_REFINE_STRENGTH))
        } else if has_globals {
            Some(MIN_REFINE_STRENGTH)
        } else {
            None
        }
    }

    /// Returns whether a whole-field clear was applied
    fn apply_auto(&self, out: &mut Raster, src: &Raster, hsv: &[Hsv], seed: &ColorSeed) -> Result<bool> {
        let SeedKind::Auto(region) = seed.kind() else {
            return Ok(false);
        };
        let cancel = self.cancel.as_ref();
        let tolerance = seed.effective_tolerance(self.config.tolerance);
        let matcher = Matcher::for_auto(seed, tolerance, &region);
        let _span = span!(Level::DEBUG, "auto_seed", dominant = region.dominant, tolerance).entered();

        if region.dominant {
            let cleared = clear_where(out, hsv, cancel, |rgb, pv| matcher.matches(rgb, pv))?;
            debug!(cleared, "Dominant background cleared");
            return Ok(true);
        }

        let matched: Vec<u8> = src
            .as_bytes()
            .par_chunks_exact(CHANNELS)
            .zip(hsv.par_iter())
            .map(|(p, &pv)| u8::from(matcher.matches([p[0], p[1], p[2]], pv)))
            .collect();
        checkpoint(cancel)?;
        let connected = flood::grow_from_border(src.width(), src.height(), &matched, cancel)?;
        let cleared = clear_region(out, &connected);
        debug!(cleared, "Border-connected background cleared");
        Ok(false)
    }

    /// Returns whether a whole-field clear was applied
    fn apply_manual(
        &self,
        out: &mut Raster,
        src: &Raster,
        hsv: &[Hsv],
        group: &SeedGroup<'_>,
    ) -> Result<bool> {
        let cancel = self.cancel.as_ref();
        let seed = group.seed;
        let tolerance = seed.effective_tolerance(self.config.tolerance);
        let ratio = simple_background_ratio(src, hsv, seed, tolerance);
        let _span = span!(Level::DEBUG, "local_seed", points = group.points.len(), ratio, tolerance).entered();

        if ratio >= SIMPLE_BACKGROUND_RATIO {
            let matcher = Matcher::for_simple_background(seed, tolerance);
            let cleared = clear_where(out, hsv, cancel, |rgb, pv| matcher.matches(rgb, pv))?;
            debug!(cleared, "Simple background cleared");
            return Ok(true);
        }

        let matcher = Matcher::for_seed(seed, tolerance);
        let bytes = src.as_bytes();
        let region = flood::grow_from_points(
            src.width(),
            src.height(),
            &group.points,
            |idx| {
                let off = idx * CHANNELS;
                matcher.matches([bytes[off], bytes[off + 1], bytes[off + 2]], hsv[idx])
            },
            cancel,
        )?;
        let cleared = clear_region(out, &region);
        debug!(cleared, "Flood fill cleared");
        Ok(false)
    }
}

/// Run color removal with `config` on a copy of `raster`
pub fn segment(raster: &Raster, seeds: &[ColorSeed], config: &ColorRemovalConfig) -> Result<Raster> {
    ColorSegmenter::new(*config).segment(raster, seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_blue(width: u32, height: u32) -> Raster {
        Raster::from_fn(width, height, |x, _| {
            if x < width / 2 {
                [255, 0, 0, 255]
            } else {
                [0, 0, 255, 255]
            }
        })
        .unwrap()
    }

    #[test]
    fn test_empty_seeds_is_identity() {
        let raster = red_blue(10, 10);
        let out = ColorSegmenter::default().segment(&raster, &[]).unwrap();
        assert_eq!(out, raster);
    }

    #[test]
    fn test_grouping_merges_points() {
        let raster = red_blue(10, 10);
        let seeds = [
            ColorSeed::local([255, 0, 0], 1, 1).with_tolerance(20.0),
            ColorSeed::local([0, 0, 255], 8, 8).with_tolerance(20.0),
            ColorSeed::local([255, 0, 0], 50, -4).with_tolerance(20.4),
        ];
        let groups = group_seeds(seeds.iter(), 50.0, &raster);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].points, vec![(1, 1), (9, 0)]);
        assert_eq!(groups[1].points, vec![(8, 8)]);
    }

    #[test]
    fn test_refine_gating() {
        let engine = ColorSegmenter::new(ColorRemovalConfig {
            refine_strength: 10.0,
            ..ColorRemovalConfig::default()
        });
        assert_eq!(engine.refine_strength(false, false), Some(40.0));
        assert_eq!(engine.refine_strength(true, true), None);

        let engine = ColorSegmenter::new(ColorRemovalConfig {
            auto_refine: false,
            ..ColorRemovalConfig::default()
        });
        assert_eq!(engine.refine_strength(true, false), Some(MIN_REFINE_STRENGTH));
        assert_eq!(engine.refine_strength(false, false), None);
    }

    #[test]
    fn test_rgb_channels_untouched() {
        let raster = red_blue(12, 12);
        let out = segment(&raster, &[ColorSeed::global([255, 0, 0])], &ColorRemovalConfig::default())
            .unwrap();
        for (a, b) in raster.as_bytes().chunks_exact(4).zip(out.as_bytes().chunks_exact(4)) {
            assert_eq!(a[..3], b[..3]);
        }
    }

    #[test]
    fn test_cancelled_token_aborts() {
        let token = CancellationToken::new();
        token.cancel();
        let engine = ColorSegmenter::default().with_cancellation(token);
        let result = engine.segment(&red_blue(8, 8), &[ColorSeed::global([255, 0, 0])]);
        assert!(matches!(result, Err(crate::ChromaShadeError::Cancelled)));
    }

    #[test]
    fn test_auto_seed_keeps_enclosed_island() {
        // Blue background with a red ring enclosing a blue island
        let raster = Raster::from_fn(30, 30, |x, y| {
            let inside_ring = (8..22).contains(&x) && (8..22).contains(&y);
            let island = (12..18).contains(&x) && (12..18).contains(&y);
            if inside_ring && !island {
                [220, 20, 20, 255]
            } else {
                [20, 40, 220, 255]
            }
        })
        .unwrap();
        let seed = ColorSeed::auto([20, 40, 220], AutoRegion::default()).with_tolerance(45.0);
        let config = ColorRemovalConfig {
            auto_refine: false,
            ..ColorRemovalConfig::default()
        };
        let out = segment(&raster, &[seed], &config).unwrap();
        assert_eq!(out.pixel(0, 0)[3], 0);
        assert_eq!(out.pixel(15, 15)[3], 255);
        assert_eq!(out.pixel(9, 9)[3], 255);
    }
}
