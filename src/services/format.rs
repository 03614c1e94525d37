//! Output format handling service
//!
//! Keeps container encoding out of the pipeline. Every supported container
//! stores the alpha plane losslessly.

use crate::{
    config::OutputFormat,
    error::{CutoutError, Result},
};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

/// Service for encoding finished cutouts
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGBA cutout into `format`
    ///
    /// # Errors
    /// - `EncodeError` when the container encoder fails or its codec is not compiled in
    ///
    /// # Examples
    /// ```rust
    /// use bgcutout::{services::OutputFormatHandler, OutputFormat};
    /// use image::RgbaImage;
    ///
    /// let bytes = OutputFormatHandler::encode(&RgbaImage::new(4, 4), OutputFormat::Rgba8)?;
    /// assert_eq!(bytes.len(), 4 * 4 * 4);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn encode(image: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CutoutError::encode("cannot encode a zero-sized image"));
        }

        match format {
            OutputFormat::Png => Self::write_container(image, ImageFormat::Png),
            OutputFormat::WebP => Self::encode_webp(image),
            OutputFormat::Tiff => Self::encode_tiff(image),
            OutputFormat::Rgba8 => Ok(image.as_raw().clone()),
        }
    }

    fn write_container(image: &RgbaImage, container: ImageFormat) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        image
            .write_to(&mut cursor, container)
            .map_err(|e| CutoutError::encode(format!("{:?} encoding failed: {}", container, e)))?;
        Ok(cursor.into_inner())
    }

    #[cfg(feature = "webp-support")]
    fn encode_webp(image: &RgbaImage) -> Result<Vec<u8>> {
        use image::{codecs::webp::WebPEncoder, ExtendedColorType, ImageEncoder};

        let mut buffer = Vec::new();
        WebPEncoder::new_lossless(&mut buffer)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| CutoutError::encode(format!("WebP encoding failed: {}", e)))?;
        Ok(buffer)
    }

    #[cfg(not(feature = "webp-support"))]
    fn encode_webp(_image: &RgbaImage) -> Result<Vec<u8>> {
        Err(CutoutError::encode(
            "WebP output requires the 'webp-support' feature",
        ))
    }

    #[cfg(feature = "tiff-support")]
    fn encode_tiff(image: &RgbaImage) -> Result<Vec<u8>> {
        Self::write_container(image, ImageFormat::Tiff)
    }

    #[cfg(not(feature = "tiff-support"))]
    fn encode_tiff(_image: &RgbaImage) -> Result<Vec<u8>> {
        Err(CutoutError::encode(
            "TIFF output requires the 'tiff-support' feature",
        ))
    }

    /// File extension (without the dot) for `format`
    ///
    /// ```rust
    /// use bgcutout::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::extension(OutputFormat::Rgba8), "rgba");
    /// ```
    #[must_use]
    pub fn extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Rgba8 => "rgba",
        }
    }

    /// MIME type for `format`
    #[must_use]
    pub fn mime_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::Rgba8 => "application/octet-stream",
        }
    }

    /// Whether `format` can be produced by this build
    #[must_use]
    pub fn is_available(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::Rgba8 => true,
            OutputFormat::WebP => cfg!(feature = "webp-support"),
            OutputFormat::Tiff => cfg!(feature = "tiff-support"),
        }
    }
}
