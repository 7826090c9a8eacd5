//! Image I/O operations service
//!
//! Decoding and encoding live here so the engines only ever see [`Raster`]s.

use crate::{
    config::{EncodeOptions, OutputFormat},
    error::{ChromaShadeError, Result},
    services::format::OutputFormatHandler,
    types::{BitMask, Raster},
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use std::io::Cursor;
use std::path::Path;

/// Extensions accepted as input images
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff"];

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image file as an RGBA raster
    ///
    /// Falls back to content sniffing when the extension does not match the data.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use chromashade::services::ImageIOService;
    ///
    /// let raster = ImageIOService::load_raster("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_raster<P: AsRef<Path>>(path: P) -> Result<Raster> {
        Raster::from_dynamic(&Self::load_image(path)?)
    }

    /// Load and decode an image file
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChromaShadeError::file_io_error(
                "read image file",
                path,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path.display(),
                    e
                );
                let data = std::fs::read(path)
                    .map_err(|io_err| ChromaShadeError::file_io_error("read image data", path, &io_err))?;
                image::load_from_memory(&data).map_err(|content_err| {
                    ChromaShadeError::processing(format!(
                        "Failed to decode {} ({} bytes): {}",
                        path.display(),
                        data.len(),
                        content_err
                    ))
                })
            },
        }
    }

    /// Decode in-memory image bytes into a raster
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Raster> {
        let image = image::load_from_memory(bytes).map_err(|e| {
            ChromaShadeError::processing(format!("Failed to decode image from bytes: {}", e))
        })?;
        Raster::from_dynamic(&image)
    }

    /// Load a painted shadow mask; pixels with luma above 127 count as set
    pub fn load_mask<P: AsRef<Path>>(path: P) -> Result<BitMask> {
        let image = Self::load_image(path)?;
        Ok(BitMask::from_luma_image(&image.to_luma8()))
    }

    /// Encode a raster into the bytes of `options.format`
    pub fn encode(raster: &Raster, options: &EncodeOptions) -> Result<Vec<u8>> {
        let image = OutputFormatHandler::convert_format(raster, options.format)?;
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        match options.format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut cursor, options.jpeg_quality.min(100));
                image.write_with_encoder(encoder)?;
            },
            format => image.write_to(&mut cursor, OutputFormatHandler::image_format(format))?,
        }
        Ok(buffer)
    }

    /// Encode a raster as PNG, keeping its alpha channel
    pub fn encode_png(raster: &Raster) -> Result<Vec<u8>> {
        Self::encode(raster, &EncodeOptions::default())
    }

    /// Save a raster, creating parent directories as needed
    ///
    /// # Examples
    /// ```rust,no_run
    /// use chromashade::{services::ImageIOService, EncodeOptions, OutputFormat, Raster};
    ///
    /// # let raster = Raster::filled(8, 8, [0, 0, 0, 255])?;
    /// let options = EncodeOptions { format: OutputFormat::Jpeg, jpeg_quality: 85 };
    /// ImageIOService::save_raster(&raster, "out/result.jpg", &options)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn save_raster<P: AsRef<Path>>(raster: &Raster, path: P, options: &EncodeOptions) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChromaShadeError::file_io_error("create output directory", parent, &e))?;
        }
        let bytes = Self::encode(raster, options)?;
        std::fs::write(path, &bytes)
            .map_err(|e| ChromaShadeError::file_io_error("write output image", path, &e))?;
        log::debug!(
            "Saved {}x{} {} to {} ({} bytes)",
            raster.width(),
            raster.height(),
            options.format,
            path.display(),
            bytes.len()
        );
        Ok(())
    }

    /// Whether a path has a supported input image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    }
}
