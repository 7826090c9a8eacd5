//! Seed colors and the ordered seed list edited by a session

use crate::color::{is_neutral, rgb_to_hsv, Hsv};
use crate::config::MAX_TOLERANCE;
use crate::types::Raster;
use serde::{Deserialize, Serialize};

/// Saturation/value bounds sampled from the image border
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvRange {
    pub s_min: f32,
    pub s_max: f32,
    pub v_min: f32,
    pub v_max: f32,
}

impl SvRange {
    /// Range grown by `ds` / `dv` on both sides, clamped to `[0, 1]`
    #[must_use]
    pub fn widened(&self, ds: f32, dv: f32) -> Self {
        Self {
            s_min: (self.s_min - ds).max(0.0),
            s_max: (self.s_max + ds).min(1.0),
            v_min: (self.v_min - dv).max(0.0),
            v_max: (self.v_max + dv).min(1.0),
        }
    }

    #[must_use]
    pub fn contains(&self, s: f32, v: f32) -> bool {
        s >= self.s_min && s <= self.s_max && v >= self.v_min && v <= self.v_max
    }
}

/// Parameters of an automatically detected background region
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AutoRegion {
    /// Explicit S/V bounds; without them the seed matches on tolerance windows
    pub range: Option<SvRange>,
    /// Hue window in degrees; defaults to one derived from tolerance
    pub hue_tolerance: Option<f32>,
    /// Clear every matching pixel instead of only the border-connected ones
    pub dominant: bool,
}

/// How a seed is applied to the raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SeedKind {
    /// Tolerance test over the whole raster
    Global,
    /// Flood fill (or simple-background clear) anchored at a clicked pixel
    Local { x: i64, y: i64 },
    /// Border-connected region growing from auto detection
    Auto(AutoRegion),
}

/// A sampled color that anchors one removal operation
///
/// Immutable once created; HSV is derived at construction. Deserialized
/// seeds recompute HSV from `rgb` and ignore any serialized value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeedRecord")]
pub struct ColorSeed {
    rgb: [u8; 3],
    hsv: Hsv,
    tolerance: Option<f32>,
    kind: SeedKind,
}

/// Fields a serialized seed is rebuilt from
#[derive(Deserialize)]
struct SeedRecord {
    rgb: [u8; 3],
    kind: SeedKind,
    #[serde(default)]
    tolerance: Option<f32>,
}

impl From<SeedRecord> for ColorSeed {
    fn from(record: SeedRecord) -> Self {
        let seed = Self::with_kind(record.rgb, record.kind);
        match record.tolerance {
            Some(tolerance) => seed.with_tolerance(tolerance),
            None => seed,
        }
    }
}

impl ColorSeed {
    fn with_kind(rgb: [u8; 3], kind: SeedKind) -> Self {
        Self {
            rgb,
            hsv: rgb_to_hsv(rgb[0], rgb[1], rgb[2]),
            tolerance: None,
            kind,
        }
    }

    /// Seed matched against every pixel of the raster
    #[must_use]
    pub fn global(rgb: [u8; 3]) -> Self {
        Self::with_kind(rgb, SeedKind::Global)
    }

    /// Seed flood-filled from `(x, y)`; coordinates are clamped onto the raster when applied
    #[must_use]
    pub fn local(rgb: [u8; 3], x: i64, y: i64) -> Self {
        Self::with_kind(rgb, SeedKind::Local { x, y })
    }

    /// Seed produced by background detection
    #[must_use]
    pub fn auto(rgb: [u8; 3], region: AutoRegion) -> Self {
        Self::with_kind(rgb, SeedKind::Auto(region))
    }

    /// Global seed sampled from the pixel under `(x, y)` (clamped)
    #[must_use]
    pub fn sample_global(raster: &Raster, x: i64, y: i64) -> Self {
        let (cx, cy) = raster.clamp_coordinate(x, y);
        let p = raster.pixel(cx, cy);
        Self::global([p[0], p[1], p[2]])
    }

    /// Local seed sampled from, and anchored at, the pixel under `(x, y)` (clamped)
    #[must_use]
    pub fn sample_local(raster: &Raster, x: i64, y: i64) -> Self {
        let (cx, cy) = raster.clamp_coordinate(x, y);
        let p = raster.pixel(cx, cy);
        Self::local([p[0], p[1], p[2]], i64::from(cx), i64::from(cy))
    }

    /// Attach a per-seed tolerance (clamped to 0-442) overriding the config fallback
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance
            .is_finite()
            .then(|| tolerance.clamp(0.0, MAX_TOLERANCE));
        self
    }

    #[must_use]
    pub fn rgb(&self) -> [u8; 3] {
        self.rgb
    }

    #[must_use]
    pub fn hsv(&self) -> Hsv {
        self.hsv
    }

    #[must_use]
    pub fn kind(&self) -> SeedKind {
        self.kind
    }

    #[must_use]
    pub fn tolerance(&self) -> Option<f32> {
        self.tolerance
    }

    /// Own tolerance if set, otherwise `fallback`
    #[must_use]
    pub fn effective_tolerance(&self, fallback: f32) -> f32 {
        self.tolerance.unwrap_or(fallback).clamp(0.0, MAX_TOLERANCE)
    }

    /// Grey/white/black seeds match on saturation and value only
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        is_neutral(self.hsv.s)
    }

    /// Batching key: seeds sharing rounded tolerance and exact color are processed together
    pub(crate) fn group_key(&self, fallback: f32) -> (i32, [u8; 3]) {
        (self.effective_tolerance(fallback).round() as i32, self.rgb)
    }
}

/// Ordered seed list with undo and reset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedList {
    seeds: Vec<ColorSeed>,
}

impl SeedList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, seed: ColorSeed) {
        self.seeds.push(seed);
    }

    /// Remove and return the most recent seed
    pub fn undo(&mut self) -> Option<ColorSeed> {
        self.seeds.pop()
    }

    pub fn reset(&mut self) {
        self.seeds.clear();
    }

    /// Replace the whole list, as auto detection does
    pub fn replace(&mut self, seeds: impl IntoIterator<Item = ColorSeed>) {
        self.seeds = seeds.into_iter().collect();
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ColorSeed] {
        &self.seeds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColorSeed> {
        self.seeds.iter()
    }
}

impl FromIterator<ColorSeed> for SeedList {
    fn from_iter<T: IntoIterator<Item = ColorSeed>>(iter: T) -> Self {
        Self {
            seeds: iter.into_iter().collect(),
        }
    }
}
