//! Output format handling service
//!
//! Keeps the conversion from a processed [`Raster`] to an encodable image
//! separate from the engines.

use crate::{config::OutputFormat, error::Result, types::Raster};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::path::Path;

/// Background color transparent pixels are composited onto for opaque formats
pub const FLATTEN_BACKGROUND: [u8; 3] = [255, 255, 255];

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert a raster into an image suitable for `format`
    ///
    /// Formats without transparency get every pixel alpha-composited onto
    /// [`FLATTEN_BACKGROUND`].
    ///
    /// # Examples
    /// ```rust
    /// use chromashade::{services::OutputFormatHandler, OutputFormat, Raster};
    ///
    /// let raster = Raster::filled(4, 4, [10, 20, 30, 0])?;
    /// let image = OutputFormatHandler::convert_format(&raster, OutputFormat::Jpeg)?;
    /// assert_eq!(image.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn convert_format(raster: &Raster, format: OutputFormat) -> Result<DynamicImage> {
        if Self::supports_transparency(format) {
            return Ok(DynamicImage::ImageRgba8(raster.to_rgba_image()?));
        }
        let mut rgb = RgbImage::new(raster.width(), raster.height());
        for (x, y, pixel) in rgb.enumerate_pixels_mut() {
            *pixel = Rgb(flatten(raster.pixel(x, y), FLATTEN_BACKGROUND));
        }
        Ok(DynamicImage::ImageRgb8(rgb))
    }

    /// File extension (without the dot) for `format`
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// Guess the output format from a path's extension
    #[must_use]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<OutputFormat> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "png" => Some(OutputFormat::Png),
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::WebP => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Codec used by the `image` crate for `format`
    #[must_use]
    pub fn image_format(format: OutputFormat) -> ImageFormat {
        match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }

    /// Warn when a color-removal result is about to lose its transparency
    pub fn warn_if_opaque(format: OutputFormat) {
        if !Self::supports_transparency(format) {
            log::warn!(
                "Output format {} does not support transparency; removed areas will be white",
                format
            );
        }
    }
}

/// Composite one RGBA pixel onto an opaque background
fn flatten(px: [u8; 4], background: [u8; 3]) -> [u8; 3] {
    let a = u32::from(px[3]);
    let mut out = [0u8; 3];
    for c in 0..3 {
        let fg = u32::from(px[c]) * a;
        let bg = u32::from(background[c]) * (255 - a);
        out[c] = ((fg + bg + 127) / 255) as u8;
    }
    out
}
