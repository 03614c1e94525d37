//! Progress reporting service
//!
//! Separates progress reporting from the pipeline so frontends can decide
//! how (and whether) to surface stage changes.

use crate::types::ProcessingTimings;
use instant::Instant;
use std::sync::Arc;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Downscaling to the working size
    Resizing,
    /// Waiting on the segmentation model
    Segmentation,
    /// Combining class masks
    MaskFusion,
    /// Remapping confidence to opacity
    AlphaMapping,
    /// Anti-aliasing the cutout edge
    EdgeSmoothing,
    /// Applying alpha to the working raster
    Compositing,
    /// Writing the output container
    Encoding,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Resizing => "Resizing to working size",
            ProcessingStage::Segmentation => "Running segmentation",
            ProcessingStage::MaskFusion => "Fusing segment masks",
            ProcessingStage::AlphaMapping => "Mapping confidence to alpha",
            ProcessingStage::EdgeSmoothing => "Smoothing edges",
            ProcessingStage::Compositing => "Compositing cutout",
            ProcessingStage::Encoding => "Encoding output",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Typical progress percentage when the stage starts
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Resizing => 5,
            ProcessingStage::Segmentation => 15,
            ProcessingStage::MaskFusion => 75,
            ProcessingStage::AlphaMapping => 80,
            ProcessingStage::EdgeSmoothing => 85,
            ProcessingStage::Compositing => 90,
            ProcessingStage::Encoding => 95,
            ProcessingStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Receives progress events from a pipeline invocation
///
/// One reporter may be shared by concurrent invocations.
pub trait ProgressReporter: Send + Sync {
    /// Report a stage change
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// Report a failure in `stage`
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// Discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Logs progress through the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// # Arguments
    /// * `verbose` - Include elapsed time and per-stage timings
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        log::info!("Cutout completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  Resize: {}ms", timings.resize_ms);
            log::info!("  Segmentation: {}ms", timings.segmentation_ms);
            log::info!("  Postprocessing: {}ms", timings.postprocessing_ms);
            log::info!("  Encode: {}ms", timings.encode_ms);
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }
}

/// Per-invocation view onto a shared reporter
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<ProcessingStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Tracker whose updates go nowhere
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    pub fn report_stage(&mut self, stage: ProcessingStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    pub fn report_completion(&mut self, timings: &ProcessingTimings) {
        self.report_stage(ProcessingStage::Completed);
        self.reporter.report_completion(timings);
    }

    /// Report an error against the most recent stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(ProcessingStage::Resizing);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        self.current_stage
    }
}
