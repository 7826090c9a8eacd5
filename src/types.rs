//! Core data types: RGBA rasters, scalar fields and binary masks

use crate::error::{ChromaShadeError, Result};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Number of interleaved channels in a [`Raster`]
pub const CHANNELS: usize = 4;

/// Check that `width * height * channels == len` and that neither side is zero
fn check_dimensions(width: u32, height: u32, channels: usize, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ChromaShadeError::invalid_dimensions(format!(
            "raster must be at least 1x1, got {}x{}",
            width, height
        )));
    }
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| {
            ChromaShadeError::invalid_dimensions(format!("{}x{} overflows usize", width, height))
        })?;
    if expected != len {
        return Err(ChromaShadeError::buffer_length_error(width, height, channels, len));
    }
    Ok(())
}

/// Owned RGBA8 pixel buffer, row-major with a top-left origin
///
/// Invariant: `data.len() == width * height * 4`, enforced by every constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Wrap an RGBA8 buffer, rejecting zero sizes and length mismatches
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height, CHANNELS, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a raster where every pixel has the same RGBA value
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        check_dimensions(width, height, 1, width as usize * height as usize)?;
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a raster by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self>
    where
        F: FnMut(u32, u32) -> [u8; 4],
    {
        check_dimensions(width, height, 1, width as usize * height as usize)?;
        let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert from an `image` RGBA buffer
    pub fn from_rgba_image(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    /// Convert any decoded image into an RGBA8 raster
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        Self::from_rgba_image(image.to_rgba8())
    }

    /// Convert into an `image` RGBA buffer for encoding
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| ChromaShadeError::processing("Failed to create image from raster data"))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels (`width * height`)
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// RGBA value at `(x, y)`; callers must stay in bounds
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let off = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let off = (y as usize * self.width as usize + x as usize) * CHANNELS;
        self.data[off..off + CHANNELS].copy_from_slice(&rgba);
    }

    /// Clamp an arbitrary (possibly negative or out-of-range) coordinate onto the raster
    #[must_use]
    pub fn clamp_coordinate(&self, x: i64, y: i64) -> (u32, u32) {
        (
            x.clamp(0, i64::from(self.width) - 1) as u32,
            y.clamp(0, i64::from(self.height) - 1) as u32,
        )
    }

    /// Count of fully transparent pixels
    #[must_use]
    pub fn transparent_count(&self) -> usize {
        self.data.chunks_exact(CHANNELS).filter(|p| p[3] == 0).count()
    }

    /// Count of pixels whose bytes differ from `other` (dimensions must match)
    #[must_use]
    pub fn differing_pixels(&self, other: &Raster) -> usize {
        self.data
            .chunks_exact(CHANNELS)
            .zip(other.data.chunks_exact(CHANNELS))
            .filter(|(a, b)| a != b)
            .count()
    }

    /// Per-pixel Rec. 709 luminance normalized to [0, 1]
    #[must_use]
    pub fn luminance_field(&self) -> ScalarField {
        let data = self
            .data
            .chunks_exact(CHANNELS)
            .map(|p| crate::color::luminance(p[0], p[1], p[2]))
            .collect();
        ScalarField {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

/// One `f32` per pixel, always paired with the dimensions of its raster
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ScalarField {
    /// Field of the given size filled with `value`
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Wrap an existing buffer, checking its length
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        check_dimensions(width, height, 1, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a field by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> f32,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Build a field from a per-index closure; used by engine stages
    pub(crate) fn from_index_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(usize) -> f32,
    {
        let data = (0..width as usize * height as usize).map(f).collect();
        Self {
            width,
            height,
            data,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Largest value, or 0 for an all-negative field
    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    /// Arithmetic mean, accumulated in `f64`
    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.data.iter().map(|&v| f64::from(v)).sum();
        (sum / self.data.len() as f64) as f32
    }

    /// Elementwise map into a new field of the same size
    #[must_use]
    pub fn map<F: Fn(f32) -> f32>(&self, f: F) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Elementwise combination of two equally sized fields
    #[must_use]
    pub fn zip_map<F: Fn(f32, f32) -> f32>(&self, other: &ScalarField, f: F) -> Self {
        debug_assert_eq!(self.data.len(), other.data.len());
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    /// Clamp every value into `[lo, hi]` in place
    pub fn clamp_in_place(&mut self, lo: f32, hi: f32) {
        for v in &mut self.data {
            *v = v.clamp(lo, hi);
        }
    }
}

/// Binary per-pixel mask stored as one byte (0 or 1) per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BitMask {
    /// All-clear mask of the given size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Wrap a byte buffer; any nonzero byte counts as set
    pub fn from_vec(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height, 1, data.len())?;
        Ok(Self {
            width,
            height,
            data: data.into_iter().map(|v| u8::from(v != 0)).collect(),
        })
    }

    /// Build a mask by evaluating a predicate for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(u8::from(f(x, y)));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Mask of every pixel whose alpha is exactly zero
    #[must_use]
    pub fn from_transparent(raster: &Raster) -> Self {
        Self {
            width: raster.width(),
            height: raster.height(),
            data: raster
                .as_bytes()
                .chunks_exact(CHANNELS)
                .map(|p| u8::from(p[3] == 0))
                .collect(),
        }
    }

    /// Interpret a grayscale image as a painted mask (white = set)
    #[must_use]
    pub fn from_luma_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.as_raw().iter().map(|&v| u8::from(v > 127)).collect(),
        }
    }

    /// Black background / white masked raster, fully opaque
    #[must_use]
    pub fn to_raster(&self) -> Raster {
        let data = self
            .data
            .iter()
            .flat_map(|&v| {
                let c = if v != 0 { 255 } else { 0 };
                [c, c, c, 255]
            })
            .collect();
        Raster {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Grayscale image with set pixels at 255
    pub fn to_luma_image(&self) -> Result<GrayImage> {
        let data = self.data.iter().map(|&v| if v != 0 { 255 } else { 0 }).collect();
        ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(self.width, self.height, data)
            .ok_or_else(|| ChromaShadeError::processing("Failed to create image from mask data"))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        self.data[y as usize * self.width as usize + x as usize] = u8::from(value);
    }

    /// Number of set pixels
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Convert to a 0/1 scalar field
    #[must_use]
    pub fn to_field(&self) -> ScalarField {
        ScalarField {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f32::from(v)).collect(),
        }
    }
}

/// Which engine produced a [`RenderResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Color-based region removal
    ColorRemoval,
    /// Shadow attenuation
    ShadowCorrection,
    /// Pristine original returned unchanged (no seeds, zero strength)
    Passthrough,
}

/// Summary of one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Engine that ran
    pub operation: Operation,
    /// Wall-clock duration of the engine call in milliseconds
    pub duration_ms: u64,
    /// Pixels cleared (color removal) or changed (shadow correction)
    pub affected_pixels: usize,
    /// Total pixels in the raster
    pub total_pixels: usize,
}

impl ProcessingMetadata {
    /// Fraction of the raster touched by the operation
    #[must_use]
    pub fn affected_ratio(&self) -> f32 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.affected_pixels as f32 / self.total_pixels as f32
        }
    }
}

/// Output raster plus its processing metadata
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub raster: Raster,
    pub metadata: ProcessingMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_rejects_bad_dimensions() {
        assert!(matches!(
            Raster::new(0, 4, vec![]),
            Err(ChromaShadeError::InvalidDimensions(_))
        ));
        assert!(matches!(
            Raster::new(2, 2, vec![0; 15]),
            Err(ChromaShadeError::InvalidDimensions(_))
        ));
        assert!(Raster::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_raster_pixel_access() {
        let mut raster = Raster::filled(3, 2, [10, 20, 30, 255]).unwrap();
        assert_eq!(raster.pixel(2, 1), [10, 20, 30, 255]);
        raster.set_pixel(1, 0, [1, 2, 3, 0]);
        assert_eq!(raster.pixel(1, 0), [1, 2, 3, 0]);
        assert_eq!(raster.transparent_count(), 1);
        assert_eq!(raster.clamp_coordinate(-5, 99), (0, 1));
    }

    #[test]
    fn test_raster_image_conversion() {
        let raster = Raster::from_fn(4, 3, |x, y| [x as u8, y as u8, 0, 255]).unwrap();
        let image = raster.to_rgba_image().unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        let back = Raster::from_rgba_image(image).unwrap();
        assert_eq!(back, raster);
    }

    #[test]
    fn test_luminance_of_gray_matches_value() {
        let raster = Raster::filled(2, 2, [128, 128, 128, 255]).unwrap();
        let lum = raster.luminance_field();
        for &v in lum.data() {
            assert!((v - 128.0 / 255.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bitmask_roundtrip_through_raster() {
        let mask = BitMask::from_fn(3, 3, |x, y| x == y);
        assert_eq!(mask.count(), 3);
        let raster = mask.to_raster();
        assert_eq!(raster.pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(raster.pixel(0, 1), [0, 0, 0, 255]);
        let luma = mask.to_luma_image().unwrap();
        assert_eq!(BitMask::from_luma_image(&luma), mask);
    }

    #[test]
    fn test_scalar_field_helpers() {
        let field = ScalarField::from_fn(2, 2, |x, y| (x + y) as f32);
        assert_eq!(field.max_value(), 2.0);
        assert!((field.mean() - 1.0).abs() < 1e-6);
        let doubled = field.map(|v| v * 2.0);
        assert_eq!(doubled.get(1, 1), 4.0);
        assert!(ScalarField::from_vec(2, 2, vec![0.0; 3]).is_err());
    }
}
