//! Background color detection from border statistics
//!
//! Samples the outer border strips and an inner ring, picks the most frequent
//! quantized color, then measures how much of the border and of the whole
//! raster shares its hue to decide whether the background is simple enough
//! for a whole-field clear.

use super::seed::{AutoRegion, ColorSeed, SvRange};
use super::tolerance::{band_width, grid_step, ALPHA_FLOOR, AUTO_HUE_MIN, CHECK_MIN_SATURATION};
use crate::color::{hue_delta, is_neutral, rgb_to_hsv};
use crate::config::MAX_TOLERANCE;
use crate::types::Raster;
use std::collections::HashMap;
use tracing::debug;

/// Quantization step of the color histogram
const QUANT_STEP: u16 = 6;
/// Fixed hue window for border and grid statistics
const STAT_HUE_WINDOW: f32 = 26.0;
const INNER_RING_FRACTION: f32 = 0.05;
const NEAR_WHITE_SATURATION: f32 = 0.10;
const NEAR_WHITE_VALUE: f32 = 0.92;
const NEAR_BLACK_VALUE: f32 = 0.08;
const NEUTRAL_MIN_TOLERANCE: f32 = 60.0;
const CHROMATIC_MIN_TOLERANCE: f32 = 45.0;
const DOMINANT_EDGE_RATIO: f32 = 0.8;
const DOMINANT_GLOBAL_RATIO: f32 = 0.6;
const DOMINANT_HUE_SLOPE: f32 = 25.0;

/// Histogram keeping first-seen order so ties resolve deterministically
#[derive(Default)]
struct Histogram {
    index: HashMap<[u16; 3], usize>,
    buckets: Vec<([u16; 3], usize)>,
}

impl Histogram {
    fn add(&mut self, key: [u16; 3]) {
        match self.index.get(&key) {
            Some(&i) => self.buckets[i].1 += 1,
            None => {
                self.index.insert(key, self.buckets.len());
                self.buckets.push((key, 1));
            }
        }
    }

    /// Most frequent bucket; the earliest seen wins a tie
    fn mode(&self) -> Option<[u16; 3]> {
        let mut best: Option<([u16; 3], usize)> = None;
        for &(key, count) in &self.buckets {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((key, count));
            }
        }
        best.map(|(key, _)| key)
    }
}

fn quantize(c: u8) -> u16 {
    (u16::from(c) + QUANT_STEP / 2) / QUANT_STEP * QUANT_STEP
}

/// Visit the outer strips: top/bottom with stride 3 along and 2 across, then left/right
fn for_each_border_sample(raster: &Raster, mut f: impl FnMut([u8; 4])) {
    let (w, h) = raster.dimensions();
    let bw = band_width(w);
    let bh = band_width(h);
    for x in (0..w).step_by(3) {
        for y in (0..bh).step_by(2) {
            f(raster.pixel(x, y));
        }
        for y in (h - bh..h).step_by(2) {
            f(raster.pixel(x, y));
        }
    }
    for y in (0..h).step_by(3) {
        for x in (0..bw).step_by(2) {
            f(raster.pixel(x, y));
        }
        for x in (w - bw..w).step_by(2) {
            f(raster.pixel(x, y));
        }
    }
}

/// Visit a ring inset 5% from the border, stride 4, skipping rasters too small to hold it
fn for_each_inner_ring_sample(raster: &Raster, mut f: impl FnMut([u8; 4])) {
    let (w, h) = raster.dimensions();
    let ix = 2.max((w as f32 * INNER_RING_FRACTION).floor() as u32);
    let iy = 2.max((h as f32 * INNER_RING_FRACTION).floor() as u32);
    if 2 * ix >= w || 2 * iy >= h {
        return;
    }
    for x in (ix..w - ix).step_by(4) {
        f(raster.pixel(x, iy));
        f(raster.pixel(x, h - 1 - iy));
    }
    for y in (iy..h - iy).step_by(4) {
        f(raster.pixel(ix, y));
        f(raster.pixel(w - 1 - ix, y));
    }
}

/// Border statistics for samples within the hue window of the chosen color
struct BorderStats {
    range: Option<SvRange>,
    ratio: f32,
}

fn border_stats(raster: &Raster, hue: f32) -> BorderStats {
    let mut range: Option<SvRange> = None;
    let mut hits = 0usize;
    let mut total = 0usize;
    for_each_border_sample(raster, |p| {
        if p[3] <= ALPHA_FLOOR {
            return;
        }
        total += 1;
        let pv = rgb_to_hsv(p[0], p[1], p[2]);
        if hue_delta(pv.h, hue) <= STAT_HUE_WINDOW {
            hits += 1;
            let r = range.get_or_insert(SvRange {
                s_min: pv.s,
                s_max: pv.s,
                v_min: pv.v,
                v_max: pv.v,
            });
            r.s_min = r.s_min.min(pv.s);
            r.s_max = r.s_max.max(pv.s);
            r.v_min = r.v_min.min(pv.v);
            r.v_max = r.v_max.max(pv.v);
        }
    });
    BorderStats {
        range,
        ratio: if total > 0 {
            hits as f32 / total as f32
        } else {
            0.0
        },
    }
}

/// Share of a coarse grid of opaque pixels within the hue window
fn global_hue_ratio(raster: &Raster, hue: f32) -> f32 {
    let (w, h) = raster.dimensions();
    let step = grid_step(w, h) as usize;
    let mut hits = 0usize;
    let mut total = 0usize;
    for y in (0..h).step_by(step) {
        for x in (0..w).step_by(step) {
            let p = raster.pixel(x, y);
            if p[3] <= ALPHA_FLOOR {
                continue;
            }
            total += 1;
            let pv = rgb_to_hsv(p[0], p[1], p[2]);
            if hue_delta(pv.h, hue) <= STAT_HUE_WINDOW && pv.s >= CHECK_MIN_SATURATION {
                hits += 1;
            }
        }
    }
    if total > 0 {
        hits as f32 / total as f32
    } else {
        0.0
    }
}

/// Detect the dominant background color along the raster border
///
/// Returns an [`Auto`](super::SeedKind::Auto) seed carrying its own tolerance,
/// S/V range and hue window, or `None` when no border sample is opaque.
#[must_use]
pub fn detect_background_seed(raster: &Raster, tolerance: f32) -> Option<ColorSeed> {
    let tolerance = if tolerance.is_finite() {
        tolerance.clamp(0.0, MAX_TOLERANCE)
    } else {
        0.0
    };

    let mut all = Histogram::default();
    let mut filtered = Histogram::default();
    let mut add = |p: [u8; 4]| {
        if p[3] <= ALPHA_FLOOR {
            return;
        }
        let key = [quantize(p[0]), quantize(p[1]), quantize(p[2])];
        all.add(key);
        let pv = rgb_to_hsv(p[0], p[1], p[2]);
        let near_white = pv.s <= NEAR_WHITE_SATURATION && pv.v >= NEAR_WHITE_VALUE;
        let near_black = pv.v <= NEAR_BLACK_VALUE;
        if !near_white && !near_black {
            filtered.add(key);
        }
    };
    for_each_border_sample(raster, &mut add);
    for_each_inner_ring_sample(raster, &mut add);

    let key = filtered.mode().or_else(|| all.mode())?;
    let rgb = key.map(|c| c.min(255) as u8);
    let hsv = rgb_to_hsv(rgb[0], rgb[1], rgb[2]);
    let seed_tolerance = tolerance.max(if is_neutral(hsv.s) {
        NEUTRAL_MIN_TOLERANCE
    } else {
        CHROMATIC_MIN_TOLERANCE
    });

    let stats = border_stats(raster, hsv.h);
    let global_ratio = global_hue_ratio(raster, hsv.h);
    let dominant = stats.ratio >= DOMINANT_EDGE_RATIO && global_ratio >= DOMINANT_GLOBAL_RATIO;

    let hue_tolerance = if dominant {
        AUTO_HUE_MIN.max((seed_tolerance / 150.0 * DOMINANT_HUE_SLOPE).round())
    } else {
        AUTO_HUE_MIN
    };
    let (ds, dv) = if dominant { (0.04, 0.06) } else { (0.02, 0.04) };
    let own = SvRange {
        s_min: hsv.s,
        s_max: hsv.s,
        v_min: hsv.v,
        v_max: hsv.v,
    };
    let sampled = stats.range.unwrap_or(own);
    let range = SvRange {
        s_min: sampled.s_min.min(hsv.s),
        s_max: sampled.s_max.max(hsv.s),
        v_min: sampled.v_min.min(hsv.v),
        v_max: sampled.v_max.max(hsv.v),
    }
    .widened(ds, dv);

    debug!(
        rgb = ?rgb,
        edge_ratio = stats.ratio,
        global_ratio,
        dominant,
        tolerance = seed_tolerance,
        "Detected background seed"
    );

    Some(
        ColorSeed::auto(
            rgb,
            AutoRegion {
                range: Some(range),
                hue_tolerance: Some(hue_tolerance),
                dominant,
            },
        )
        .with_tolerance(seed_tolerance),
    )
}
