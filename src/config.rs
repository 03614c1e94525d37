//! Configuration types for cutout operations

use crate::error::{CutoutError, Result};
use crate::postprocessing::alpha::AlphaCurve;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest working dimension used when none is configured
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// JPEG quality used when a segmenter wants an encoded request
pub const DEFAULT_SEGMENTER_JPEG_QUALITY: u8 = 95;

/// Budget for model cold-start plus inference
pub const DEFAULT_SEGMENTATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Output container options; all of them keep the alpha plane lossless
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// Lossless WebP with alpha channel transparency
    WebP,
    /// TIFF with alpha channel transparency
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::WebP => write!(f, "webp"),
            Self::Tiff => write!(f, "tiff"),
            Self::Rgba8 => write!(f, "rgba8"),
        }
    }
}

/// Interpolation filter used when downscaling to the working size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for cutout operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoutConfig {
    /// Largest side of the working raster; larger inputs are downscaled
    pub max_dimension: u32,

    /// Filter used for the downscale
    pub resize_filter: ResizeFilter,

    /// Confidence to opacity mapping
    pub alpha_curve: AlphaCurve,

    /// Upper bound on the segmentation call (`None` waits indefinitely)
    pub segmentation_timeout: Option<Duration>,

    /// Output container
    pub output_format: OutputFormat,

    /// JPEG quality for segmenters that take an encoded request (1-100)
    pub segmenter_jpeg_quality: u8,
}

impl Default for CutoutConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            resize_filter: ResizeFilter::default(),
            alpha_curve: AlphaCurve::default(),
            segmentation_timeout: Some(DEFAULT_SEGMENTATION_TIMEOUT),
            output_format: OutputFormat::default(),
            segmenter_jpeg_quality: DEFAULT_SEGMENTER_JPEG_QUALITY,
        }
    }
}

impl CutoutConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bgcutout::{CutoutConfig, OutputFormat};
    /// use std::time::Duration;
    ///
    /// let config = CutoutConfig::builder()
    ///     .max_dimension(768)
    ///     .output_format(OutputFormat::Png)
    ///     .segmentation_timeout(Some(Duration::from_secs(30)))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_dimension, 768);
    /// ```
    #[must_use]
    pub fn builder() -> CutoutConfigBuilder {
        CutoutConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - `max_dimension` of zero
    /// - Invalid alpha curve parameters
    /// - JPEG quality outside 1-100
    /// - A zero segmentation timeout
    pub fn validate(&self) -> Result<()> {
        if self.max_dimension == 0 {
            return Err(CutoutError::config_value_error(
                "max dimension",
                self.max_dimension,
                ">0",
                Some(DEFAULT_MAX_DIMENSION),
            ));
        }

        self.alpha_curve.validate()?;

        if !(1..=100).contains(&self.segmenter_jpeg_quality) {
            return Err(CutoutError::config_value_error(
                "segmenter JPEG quality",
                self.segmenter_jpeg_quality,
                "1-100",
                Some(DEFAULT_SEGMENTER_JPEG_QUALITY),
            ));
        }

        if self.segmentation_timeout == Some(Duration::ZERO) {
            return Err(CutoutError::invalid_config(
                "Segmentation timeout must be non-zero (use None to disable it)",
            ));
        }

        Ok(())
    }
}

/// Builder for `CutoutConfig`
#[derive(Debug, Default)]
pub struct CutoutConfigBuilder {
    config: CutoutConfig,
}

impl CutoutConfigBuilder {
    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    #[must_use]
    pub fn resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.config.resize_filter = filter;
        self
    }

    #[must_use]
    pub fn alpha_curve(mut self, curve: AlphaCurve) -> Self {
        self.config.alpha_curve = curve;
        self
    }

    #[must_use]
    pub fn segmentation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.segmentation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn segmenter_jpeg_quality(mut self, quality: u8) -> Self {
        self.config.segmenter_jpeg_quality = quality.min(100);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any failure reported by [`CutoutConfig::validate`]
    pub fn build(self) -> Result<CutoutConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
