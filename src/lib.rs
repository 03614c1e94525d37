#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]

//! # bgcutout
//!
//! Post-processing pipeline that turns a photo plus per-class segmentation
//! masks into a clean RGBA cutout with soft, anti-aliased edges.
//!
//! The segmentation model is an external collaborator behind the
//! [`Segmenter`] trait. This crate owns everything around it:
//!
//! - **Resize**: bound the source to a working resolution (default 1024 px)
//! - **Fuse**: per-pixel maximum over foreground labels, excluding
//!   `background`, `wall` and `floor`
//! - **Alpha curve**: threshold 0.3 followed by a 0.7 power curve
//! - **Edge smoothing**: weighted cross kernel over partially transparent pixels
//! - **Encode**: lossless PNG (default), WebP, TIFF or raw RGBA8
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgcutout::{CommandLoader, CommandSegmenter, CutoutConfig, CutoutProcessor, ModelHandle};
//!
//! # async fn example() -> anyhow::Result<()> {
//! // One handle per process; clones share the same lazily loaded model
//! let model = ModelHandle::lazy(CommandLoader::new(
//!     CommandSegmenter::new("./segment.py").with_args(["--model", "mask2former"]),
//! ));
//!
//! let processor = CutoutProcessor::new(CutoutConfig::default(), model)?;
//! let result = processor.process_file("portrait.jpg").await?;
//! result.save("portrait_cutout.png")?;
//! println!("{}", result.timing_summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Post-processing only
//!
//! Callers that already hold a segmentation result can run the CPU-only tail
//! directly:
//!
//! ```rust
//! use bgcutout::{postprocess, AlphaCurve, SegmentationOutput};
//! use image::RgbaImage;
//!
//! let image = RgbaImage::new(2, 2);
//! let segmentation = SegmentationOutput::new(2, 2)
//!     .with_segment("person", 0.97, Some(&[1.0, 1.0, 0.0, 0.0]))?;
//! let cutout = postprocess(image, &segmentation, &AlphaCurve::default())?;
//! assert_eq!(cutout.get_pixel(0, 0)[3], 255);
//! assert_eq!(cutout.get_pixel(0, 1)[3], 0);
//! # Ok::<(), bgcutout::CutoutError>(())
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `bgcutout` binary, tracing subscriber setup
//! - `webp-support` (default): lossless WebP output
//! - `tiff-support` (default): TIFF output
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod postprocessing;
pub mod processor;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;

// Public API exports
pub use backends::{CommandLoader, CommandSegmenter};
pub use config::{
    CutoutConfig, CutoutConfigBuilder, OutputFormat, ResizeFilter, DEFAULT_MAX_DIMENSION,
    DEFAULT_SEGMENTATION_TIMEOUT, DEFAULT_SEGMENTER_JPEG_QUALITY,
};
pub use error::{CutoutError, Result, SegmentationFailure};
pub use inference::{validate_output, ModelHandle, ModelLoader, SegmentRequest, Segmenter};
pub use postprocessing::{
    postprocess, AlphaCurve, Compositor, EdgeSmoother, MaskFuser, ALPHA_EXPONENT,
    ALPHA_THRESHOLD, EXCLUDED_LABELS,
};
pub use processor::CutoutProcessor;
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{
    AlphaBuffer, ConfidenceMask, CutoutResult, ProcessingMetadata, ProcessingTimings, Segment,
    SegmentationOutput,
};
pub use utils::{ImagePreprocessor, Resized};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Cut out the foreground of an encoded image
///
/// Convenience wrapper that builds a one-off [`CutoutProcessor`]. Long-running
/// callers should keep a processor around instead.
///
/// # Examples
/// ```rust,no_run
/// use bgcutout::{remove_background, CommandSegmenter, CutoutConfig, ModelHandle};
/// use std::sync::Arc;
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let model = ModelHandle::ready(Arc::new(CommandSegmenter::new("segment")));
/// let result = remove_background(&upload, &CutoutConfig::default(), &model).await?;
/// assert!(!result.data.is_empty());
/// # Ok(())
/// # }
/// ```
pub async fn remove_background(
    image_bytes: &[u8],
    config: &CutoutConfig,
    model: &ModelHandle,
) -> Result<CutoutResult> {
    CutoutProcessor::new(config.clone(), model.clone())?
        .process_bytes(image_bytes)
        .await
}

/// Cut out the foreground of an image read from an async stream
///
/// # Examples
/// ```rust,no_run
/// use bgcutout::{remove_background_from_reader, CommandSegmenter, CutoutConfig, ModelHandle};
/// use std::sync::Arc;
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let model = ModelHandle::ready(Arc::new(CommandSegmenter::new("segment")));
/// let file = File::open("large_image.jpg").await?;
/// let result = remove_background_from_reader(file, &CutoutConfig::default(), &model).await?;
/// result.save("large_image_cutout.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    config: &CutoutConfig,
    model: &ModelHandle,
) -> Result<CutoutResult> {
    CutoutProcessor::new(config.clone(), model.clone())?
        .process_reader(reader)
        .await
}
