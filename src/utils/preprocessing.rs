//! Image preprocessing ahead of segmentation
//!
//! Bounds the source raster to the working resolution and prepares the
//! encoded request some segmenters expect.

use crate::{
    config::ResizeFilter,
    error::{CutoutError, Result},
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, RgbaImage};
use tracing::debug;

/// Working raster plus whether it differs from the source
#[derive(Debug, Clone)]
pub struct Resized {
    pub image: RgbaImage,
    pub resized: bool,
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Target size for a source of `dimensions` bounded by `max_dimension`
    ///
    /// Returns `None` when the source already fits. The larger side becomes
    /// exactly `max_dimension`; the other side is scaled by the same factor and
    /// rounded, never below one pixel.
    #[must_use]
    pub fn working_dimensions(dimensions: (u32, u32), max_dimension: u32) -> Option<(u32, u32)> {
        let (width, height) = dimensions;
        if width.max(height) <= max_dimension {
            return None;
        }

        let scaled = |side: u32, larger: u32| -> u32 {
            let value = (f64::from(side) * f64::from(max_dimension) / f64::from(larger)).round();
            (value as u32).clamp(1, max_dimension)
        };

        if width > height {
            Some((max_dimension, scaled(height, width)))
        } else {
            Some((scaled(width, height), max_dimension))
        }
    }

    /// Downscale so neither side exceeds `max_dimension`, preserving aspect ratio
    ///
    /// Inputs that already fit are returned untouched. Never upscales.
    ///
    /// # Errors
    /// - Zero width or height
    /// - Zero `max_dimension`
    pub fn bound_to_working_size(
        image: RgbaImage,
        max_dimension: u32,
        filter: ResizeFilter,
    ) -> Result<Resized> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CutoutError::invalid_input(format!(
                "image has zero-sized dimension ({}x{})",
                width, height
            )));
        }
        if max_dimension == 0 {
            return Err(CutoutError::invalid_config("max dimension must be positive"));
        }

        match Self::working_dimensions((width, height), max_dimension) {
            None => Ok(Resized {
                image,
                resized: false,
            }),
            Some((new_width, new_height)) => {
                debug!(
                    from = %format!("{}x{}", width, height),
                    to = %format!("{}x{}", new_width, new_height),
                    "Downscaling to working size"
                );
                let image =
                    image::imageops::resize(&image, new_width, new_height, filter.into());
                Ok(Resized {
                    image,
                    resized: true,
                })
            },
        }
    }

    /// JPEG-encode a working raster for segmenters that take encoded bytes
    ///
    /// Alpha is dropped; JPEG has no alpha plane.
    ///
    /// # Errors
    /// - Zero-sized image
    /// - Encoder failure
    pub fn encode_for_segmenter(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CutoutError::invalid_input("cannot encode a zero-sized image"));
        }

        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder
            .encode_image(&rgb)
            .map_err(|e| CutoutError::invalid_input(format!("Failed to JPEG-encode request: {}", e)))?;
        Ok(buffer)
    }
}
