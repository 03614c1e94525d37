//! Writes the final opacity into the working raster

use crate::error::{CutoutError, Result};
use crate::types::AlphaBuffer;
use image::RgbaImage;

/// Replaces the alpha channel of an RGBA raster
pub struct Compositor;

impl Compositor {
    /// Keep every pixel's RGB and take alpha from `alpha`
    ///
    /// # Errors
    /// - `alpha` shape differs from the image's `(height, width)`
    pub fn composite(mut image: RgbaImage, alpha: &AlphaBuffer) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        if alpha.dim() != (height as usize, width as usize) {
            return Err(CutoutError::invalid_input(format!(
                "alpha buffer is {}x{}, image is {}x{}",
                alpha.ncols(),
                alpha.nrows(),
                width,
                height
            )));
        }

        // Both are row-major, so pixel order matches logical iteration order
        for (pixel, &value) in image.pixels_mut().zip(alpha.iter()) {
            pixel[3] = value;
        }
        Ok(image)
    }
}
