//! Segmentation collaborator boundary and the shared model handle
//!
//! The segmentation model itself is external. This module only fixes the
//! shape of the call: one image in, labeled confidence masks out, bounded by
//! a timeout and never retried.

use crate::{
    config::DEFAULT_SEGMENTER_JPEG_QUALITY,
    error::{CutoutError, Result, SegmentationFailure},
    types::SegmentationOutput,
};
use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, instrument, warn};

/// One segmentation call
#[derive(Debug, Clone, Copy)]
pub struct SegmentRequest<'a> {
    /// Working raster; returned masks are sized to it
    pub image: &'a RgbaImage,
    /// JPEG quality for segmenters that send an encoded image (1-100)
    pub jpeg_quality: u8,
}

impl<'a> SegmentRequest<'a> {
    #[must_use]
    pub fn new(image: &'a RgbaImage) -> Self {
        Self {
            image,
            jpeg_quality: DEFAULT_SEGMENTER_JPEG_QUALITY,
        }
    }

    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Size of the request raster
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A loaded semantic-segmentation model
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Run inference on one working raster
    ///
    /// Returned masks must be sized to `request.image`.
    ///
    /// # Errors
    /// - `SegmentationError` for unavailable collaborators or malformed results
    async fn segment(&self, request: SegmentRequest<'_>) -> Result<SegmentationOutput>;

    /// Human-readable model name for logs and metadata
    fn name(&self) -> &str;

    /// Whether `segment` may run concurrently on one instance
    ///
    /// When `false`, [`ModelHandle`] serializes calls.
    fn supports_concurrent_inference(&self) -> bool {
        true
    }
}

/// Produces a [`Segmenter`] on first use
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the model (cold start)
    ///
    /// # Errors
    /// - Any failure to make the model usable
    async fn load(&self) -> Result<Arc<dyn Segmenter>>;
}

struct HandleInner {
    cell: OnceCell<Arc<dyn Segmenter>>,
    loader: Option<Box<dyn ModelLoader>>,
    gate: Mutex<()>,
}

/// Process-wide handle to one segmentation model
///
/// Cloning is cheap and every clone refers to the same model. A lazy handle
/// initializes at most once even under concurrent first calls; a failed or
/// cancelled load leaves it uninitialized so a later call can try again.
/// Models that do not support concurrent inference are serialized through an
/// internal gate, all others run calls independently.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("loaded", &self.is_loaded())
            .field("segmenter", &self.segmenter_name())
            .finish()
    }
}

impl ModelHandle {
    /// Wrap an already-loaded model
    #[must_use]
    pub fn ready(segmenter: Arc<dyn Segmenter>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                cell: OnceCell::new_with(Some(segmenter)),
                loader: None,
                gate: Mutex::new(()),
            }),
        }
    }

    /// Defer loading until the first segmentation call
    #[must_use]
    pub fn lazy<L: ModelLoader + 'static>(loader: L) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                cell: OnceCell::new(),
                loader: Some(Box::new(loader)),
                gate: Mutex::new(()),
            }),
        }
    }

    /// Whether the model has been loaded
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.cell.initialized()
    }

    /// Name of the loaded model, if any
    #[must_use]
    pub fn segmenter_name(&self) -> Option<String> {
        self.inner.cell.get().map(|s| s.name().to_string())
    }

    /// Load the model now instead of on first use
    ///
    /// # Errors
    /// - `SegmentationError(Unavailable)` when the loader fails
    pub async fn warm_up(&self) -> Result<()> {
        self.get_or_load().await.map(|_| ())
    }

    async fn get_or_load(&self) -> Result<Arc<dyn Segmenter>> {
        let segmenter = self
            .inner
            .cell
            .get_or_try_init(|| async {
                let loader = self
                    .inner
                    .loader
                    .as_ref()
                    .ok_or_else(|| CutoutError::unavailable("no model loader configured"))?;
                info!("Loading segmentation model");
                let loaded = loader.load().await.map_err(|e| match e {
                    CutoutError::Segmentation(failure) => CutoutError::Segmentation(failure),
                    other => CutoutError::unavailable(format!("model load failed: {}", other)),
                })?;
                info!(segmenter = loaded.name(), "Segmentation model ready");
                Ok::<_, CutoutError>(loaded)
            })
            .await?;
        Ok(Arc::clone(segmenter))
    }

    /// Segment one working raster
    ///
    /// This is the pipeline's only suspension point. The optional `timeout`
    /// covers a lazy model load, waiting on the serialization gate and the
    /// inference itself.
    ///
    /// # Errors
    /// - `SegmentationError(TimedOut)` when `timeout` elapses
    /// - `SegmentationError(Unavailable)` when the model cannot be loaded
    /// - `SegmentationError(Empty | Malformed)` for unusable results
    #[instrument(
        skip(self, request),
        fields(
            width = request.image.width(),
            height = request.image.height(),
            jpeg_quality = request.jpeg_quality
        )
    )]
    pub async fn segment(
        &self,
        request: SegmentRequest<'_>,
        timeout: Option<Duration>,
    ) -> Result<SegmentationOutput> {
        let call = self.segment_unbounded(request);
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Segmentation timed out");
                    Err(SegmentationFailure::TimedOut(limit).into())
                },
            },
            None => call.await,
        }
    }

    async fn segment_unbounded(&self, request: SegmentRequest<'_>) -> Result<SegmentationOutput> {
        let segmenter = self.get_or_load().await?;

        let output = if segmenter.supports_concurrent_inference() {
            segmenter.segment(request).await?
        } else {
            let _guard = self.inner.gate.lock().await;
            segmenter.segment(request).await?
        };

        validate_output(&output, request.dimensions())?;
        debug!(
            segmenter = segmenter.name(),
            segments = output.len(),
            "Segmentation complete"
        );
        Ok(output)
    }
}

/// Reject results the rest of the pipeline cannot use
///
/// # Errors
/// - `SegmentationError(Empty)` for an empty segment list
/// - `SegmentationError(Malformed)` for results sized differently from the request
pub fn validate_output(output: &SegmentationOutput, request: (u32, u32)) -> Result<()> {
    if output.is_empty() {
        return Err(SegmentationFailure::Empty.into());
    }
    if output.dimensions() != request {
        let (w, h) = output.dimensions();
        return Err(CutoutError::malformed(format!(
            "result is {}x{}, request was {}x{}",
            w, h, request.0, request.1
        )));
    }
    Ok(())
}
