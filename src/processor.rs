//! Cutout processor
//!
//! `CutoutProcessor` runs one linear pipeline per image:
//! resize, segment, fuse, alpha, smooth, composite, encode. The segmentation
//! call is the only suspension point. A processor holds no per-image state, so
//! one instance can serve many concurrent invocations.

use crate::{
    config::CutoutConfig,
    error::Result,
    inference::{ModelHandle, SegmentRequest},
    postprocessing::{postprocess_tracked, MaskFuser},
    services::{
        ImageIOService, NoOpProgressReporter, OutputFormatHandler, ProcessingStage,
        ProgressReporter, ProgressTracker,
    },
    types::{CutoutResult, ProcessingMetadata, ProcessingTimings},
    utils::{ImagePreprocessor, Resized},
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, instrument, span, Instrument, Level};

/// Runs the cutout pipeline against a shared segmentation model
#[derive(Clone)]
pub struct CutoutProcessor {
    config: CutoutConfig,
    model: ModelHandle,
    progress: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for CutoutProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutoutProcessor")
            .field("config", &self.config)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl CutoutProcessor {
    /// Create a processor; `config` is validated here
    ///
    /// # Errors
    /// - `InvalidConfig` when `config` does not validate
    pub fn new(config: CutoutConfig, model: ModelHandle) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            model,
            progress: Arc::new(NoOpProgressReporter),
        })
    }

    /// Route stage updates to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = reporter;
        self
    }

    #[must_use]
    pub fn config(&self) -> &CutoutConfig {
        &self.config
    }

    /// Handle to the shared model
    #[must_use]
    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Produce an encoded cutout from a decoded raster
    ///
    /// Either the full result or an error is returned; there is no partial output.
    ///
    /// # Errors
    /// - `InvalidInput` for zero-sized rasters
    /// - `SegmentationError` for every segmentation failure, including timeouts
    /// - `EncodeError` when the output container cannot be written
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub async fn process(&self, image: RgbaImage) -> Result<CutoutResult> {
        let mut tracker = ProgressTracker::new(Arc::clone(&self.progress));
        let result = self.run(image, &mut tracker).await;
        match &result {
            Ok(cutout) => tracker.report_completion(&cutout.metadata.timings),
            Err(e) => tracker.report_error(&e.to_string()),
        }
        result
    }

    async fn run(&self, image: RgbaImage, tracker: &mut ProgressTracker) -> Result<CutoutResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::new();
        let source_dimensions = image.dimensions();

        info!(
            source_width = source_dimensions.0,
            source_height = source_dimensions.1,
            format = %self.config.output_format,
            "Starting cutout"
        );

        tracker.report_stage(ProcessingStage::Resizing);
        let resize_start = Instant::now();
        let Resized {
            image: working,
            resized,
        } = {
            let _span = span!(
                Level::DEBUG,
                "resize",
                max_dimension = self.config.max_dimension
            )
            .entered();
            ImagePreprocessor::bound_to_working_size(
                image,
                self.config.max_dimension,
                self.config.resize_filter,
            )?
        };
        timings.resize_ms = resize_start.elapsed().as_millis() as u64;

        tracker.report_stage(ProcessingStage::Segmentation);
        let segmentation_start = Instant::now();
        let segmentation = self
            .model
            .segment(
                SegmentRequest::new(&working).with_jpeg_quality(self.config.segmenter_jpeg_quality),
                self.config.segmentation_timeout,
            )
            .instrument(span!(Level::INFO, "segmentation"))
            .await?;
        timings.segmentation_ms = segmentation_start.elapsed().as_millis() as u64;

        let segment_count = segmentation.len();
        let included_labels = MaskFuser::included_labels(segmentation.segments());
        debug!(
            segments = segment_count,
            included = ?included_labels,
            "Segmentation received"
        );

        let postprocess_start = Instant::now();
        let cutout = postprocess_tracked(
            working,
            &segmentation,
            &self.config.alpha_curve,
            tracker,
        )?;
        drop(segmentation);
        timings.postprocessing_ms = postprocess_start.elapsed().as_millis() as u64;

        tracker.report_stage(ProcessingStage::Encoding);
        let encode_start = Instant::now();
        let dimensions = cutout.dimensions();
        let data = {
            let _span = span!(Level::DEBUG, "encode", format = %self.config.output_format).entered();
            OutputFormatHandler::encode(&cutout, self.config.output_format)?
        };
        timings.encode_ms = encode_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        let mut metadata = ProcessingMetadata::new(
            self.model
                .segmenter_name()
                .unwrap_or_else(|| "unknown".to_string()),
            self.config.output_format,
        );
        metadata.segment_count = segment_count;
        metadata.included_labels = included_labels;
        metadata.timings = timings;

        info!(
            width = dimensions.0,
            height = dimensions.1,
            bytes = data.len(),
            total_ms = metadata.timings.total_ms,
            "Cutout complete"
        );

        Ok(CutoutResult {
            data,
            format: self.config.output_format,
            dimensions,
            source_dimensions,
            resized,
            metadata,
        })
    }

    /// Process any decoded image; it is converted to RGBA8 first
    ///
    /// # Errors
    /// Same as [`CutoutProcessor::process`].
    pub async fn process_dynamic(&self, image: DynamicImage) -> Result<CutoutResult> {
        self.process(image.into_rgba8()).await
    }

    /// Process encoded image bytes
    ///
    /// # Errors
    /// - `InvalidInput` when the bytes cannot be decoded
    /// - Everything [`CutoutProcessor::process`] can return
    pub async fn process_bytes(&self, bytes: &[u8]) -> Result<CutoutResult> {
        let image = ImageIOService::load_from_bytes(bytes)?;
        self.process_dynamic(image).await
    }

    /// Process an image file
    ///
    /// # Errors
    /// - `Io` when the file cannot be read
    /// - `InvalidInput` when it cannot be decoded
    /// - Everything [`CutoutProcessor::process`] can return
    pub async fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<CutoutResult> {
        let path = path.as_ref().to_path_buf();
        let image = tokio::task::spawn_blocking(move || ImageIOService::load_image(path))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
        self.process_dynamic(image).await
    }

    /// Process a base64 `data:` URL
    ///
    /// # Errors
    /// - `InvalidInput` when the URL or its payload cannot be decoded
    /// - Everything [`CutoutProcessor::process`] can return
    pub async fn process_data_url(&self, url: &str) -> Result<CutoutResult> {
        let image = ImageIOService::load_from_data_url(url)?;
        self.process_dynamic(image).await
    }

    /// Read a whole stream and process it
    ///
    /// # Errors
    /// - `Io` when reading fails
    /// - `InvalidInput` when the data cannot be decoded
    /// - Everything [`CutoutProcessor::process`] can return
    pub async fn process_reader<R: AsyncRead + Unpin>(&self, reader: R) -> Result<CutoutResult> {
        let image = ImageIOService::load_from_reader(reader).await?;
        self.process_dynamic(image).await
    }
}
