//! Image input service
//!
//! Decodes files, byte buffers and async streams into rasters. Anything that
//! cannot be decoded is reported as invalid input, never as an I/O error.
//! EXIF orientation is applied during decoding, so camera photos come out
//! upright.

use crate::error::{CutoutError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{metadata::Orientation, DynamicImage, ImageDecoder, ImageError, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Service for loading source images
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// The format is guessed from content, so a misleading extension still
    /// decodes.
    ///
    /// # Errors
    /// - `Io` when the file cannot be read
    /// - `InvalidInput` when its content is not a decodable image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use bgcutout::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)
            .map_err(|e| CutoutError::file_io_error("read image file", path_ref, &e))?;

        Self::load_from_bytes(&data).map_err(|e| match e {
            CutoutError::InvalidInput(msg) => {
                CutoutError::invalid_input(format!("{}: {}", path_ref.display(), msg))
            },
            other => other,
        })
    }

    /// Decode an image from encoded bytes, honoring its EXIF orientation
    ///
    /// # Errors
    /// - `InvalidInput` for empty, truncated or unrecognized data
    pub fn load_from_bytes(data: &[u8]) -> Result<DynamicImage> {
        if data.is_empty() {
            return Err(CutoutError::invalid_input("image data is empty"));
        }
        let decode_failed = |e: ImageError| {
            log::debug!("Image decode failed for {} bytes: {}", data.len(), e);
            CutoutError::invalid_input(format!("failed to decode image: {}", e))
        };

        let mut decoder = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .into_decoder()
            .map_err(decode_failed)?;
        // Unreadable metadata is not worth failing the whole image over
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut image = DynamicImage::from_decoder(decoder).map_err(decode_failed)?;

        if orientation != Orientation::NoTransforms {
            log::debug!("Applying EXIF orientation {:?}", orientation);
            image.apply_orientation(orientation);
        }
        Ok(image)
    }

    /// Decode a `data:[<mime>];base64,<payload>` URL
    ///
    /// The declared MIME type is ignored; the format is guessed from content.
    ///
    /// # Errors
    /// - `InvalidInput` for anything but a base64 data URL of a decodable image
    pub fn load_from_data_url(url: &str) -> Result<DynamicImage> {
        let rest = url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| CutoutError::invalid_input("not a data URL"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| CutoutError::invalid_input("data URL has no payload"))?;
        if !header.ends_with(";base64") {
            return Err(CutoutError::invalid_input(
                "only base64-encoded data URLs are supported",
            ));
        }

        let data = STANDARD
            .decode(payload)
            .map_err(|e| CutoutError::invalid_input(format!("invalid base64 payload: {}", e)))?;
        Self::load_from_bytes(&data)
    }

    /// Read a whole stream and decode it
    ///
    /// # Errors
    /// - `Io` when reading the stream fails
    /// - `InvalidInput` when the data is not a decodable image
    pub async fn load_from_reader<R: AsyncRead + Unpin>(mut reader: R) -> Result<DynamicImage> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        Self::load_from_bytes(&data)
    }

    /// Whether `path` has an extension this build can decode
    #[must_use]
    pub fn is_supported_image<P: AsRef<Path>>(path: P) -> bool {
        ImageFormat::from_path(path.as_ref())
            .map(|format| format.reading_enabled())
            .unwrap_or(false)
    }
}
