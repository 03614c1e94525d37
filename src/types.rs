//! Core types for cutout operations

use crate::{
    config::OutputFormat,
    error::{CutoutError, Result},
    services::OutputFormatHandler,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-pixel foreground confidence, shaped `(height, width)`
pub type ConfidenceMask = Array2<f32>;

/// Per-pixel 8-bit opacity, shaped `(height, width)`
pub type AlphaBuffer = Array2<u8>;

/// One labeled mask borrowed from a [`SegmentationOutput`]
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub label: &'a str,
    pub score: f32,
    /// `None` when the segmenter reported the label without mask data
    pub mask: Option<ArrayView2<'a, f32>>,
}

#[derive(Debug, Clone)]
struct SegmentEntry {
    label: String,
    score: f32,
    plane: Option<usize>,
}

/// Labeled confidence masks returned by one segmentation call
///
/// All mask planes live in one contiguous buffer; [`SegmentationOutput::segments`]
/// hands out read-only views into it.
#[derive(Debug, Clone)]
pub struct SegmentationOutput {
    width: u32,
    height: u32,
    entries: Vec<SegmentEntry>,
    planes: Vec<f32>,
}

impl SegmentationOutput {
    /// Create an empty result for a request image of the given size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            entries: Vec::new(),
            planes: Vec::new(),
        }
    }

    fn plane_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Append a segment, copying its row-major mask into the shared buffer
    ///
    /// # Errors
    /// - Non-finite score
    /// - Mask length different from `width * height`
    /// - Non-finite mask values
    pub fn push_segment<S: Into<String>>(
        &mut self,
        label: S,
        score: f32,
        mask: Option<&[f32]>,
    ) -> Result<()> {
        let label = label.into();
        if !score.is_finite() {
            return Err(CutoutError::malformed(format!(
                "segment '{}' has non-finite score {}",
                label, score
            )));
        }

        let plane = match mask {
            Some(values) => {
                let expected = self.plane_len();
                if values.len() != expected {
                    return Err(CutoutError::malformed(format!(
                        "mask for '{}' has {} values, expected {} ({}x{})",
                        label,
                        values.len(),
                        expected,
                        self.width,
                        self.height
                    )));
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(CutoutError::malformed(format!(
                        "mask for '{}' contains non-finite values",
                        label
                    )));
                }
                let index = self.planes.len() / expected.max(1);
                self.planes.extend_from_slice(values);
                Some(index)
            },
            None => None,
        };

        self.entries.push(SegmentEntry {
            label,
            score,
            plane,
        });
        Ok(())
    }

    /// Builder-style variant of [`SegmentationOutput::push_segment`]
    ///
    /// # Errors
    /// Same as [`SegmentationOutput::push_segment`].
    pub fn with_segment<S: Into<String>>(
        mut self,
        label: S,
        score: f32,
        mask: Option<&[f32]>,
    ) -> Result<Self> {
        self.push_segment(label, score, mask)?;
        Ok(self)
    }

    /// Dimensions of the request image this result describes
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Segments in the order the segmenter reported them
    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> + '_ {
        let plane_len = self.plane_len();
        let shape = (self.height as usize, self.width as usize);
        self.entries.iter().map(move |entry| {
            let mask = entry.plane.and_then(|index| {
                let start = index * plane_len;
                self.planes
                    .get(start..start + plane_len)
                    .and_then(|slice| ArrayView2::from_shape(shape, slice).ok())
            });
            Segment {
                label: &entry.label,
                score: entry.score,
                mask,
            }
        })
    }

    /// Labels in reported order
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }
}

/// Timing breakdown for one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Downscale to the working size
    pub resize_ms: u64,

    /// Segmentation call, including a lazy model load
    pub segmentation_ms: u64,

    /// Fusion, alpha mapping, smoothing and compositing
    pub postprocessing_ms: u64,

    /// Final container encoding
    pub encode_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of the total spent waiting on the segmenter
    #[must_use]
    pub fn segmentation_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.segmentation_ms as f64 / self.total_ms as f64
        }
    }

    /// Time not attributed to any stage
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured =
            self.resize_ms + self.segmentation_ms + self.postprocessing_ms + self.encode_ms;
        self.total_ms.saturating_sub(measured)
    }
}

/// Metadata about one processed image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Name reported by the segmenter
    pub segmenter: String,

    /// Number of segments the segmenter returned
    pub segment_count: usize,

    /// Labels that contributed to the fused confidence
    pub included_labels: Vec<String>,

    /// Output container
    pub output_format: OutputFormat,

    /// Completion time
    pub processed_at: DateTime<Utc>,

    /// Detailed timing breakdown
    pub timings: ProcessingTimings,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(segmenter: String, output_format: OutputFormat) -> Self {
        Self {
            segmenter,
            segment_count: 0,
            included_labels: Vec::new(),
            output_format,
            processed_at: Utc::now(),
            timings: ProcessingTimings::new(),
        }
    }
}

/// Encoded cutout and what it took to produce it
#[derive(Debug, Clone)]
pub struct CutoutResult {
    /// Encoded image bytes in `format`
    pub data: Vec<u8>,

    /// Container of `data`
    pub format: OutputFormat,

    /// Dimensions of the encoded image (the working size)
    pub dimensions: (u32, u32),

    /// Dimensions of the image handed to the pipeline
    pub source_dimensions: (u32, u32),

    /// Whether the source was downscaled
    pub resized: bool,

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl CutoutResult {
    /// Write the encoded bytes to `path`
    ///
    /// # Errors
    /// - Parent directory creation or file write failures
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CutoutError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }
        std::fs::write(path_ref, &self.data)
            .map_err(|e| CutoutError::file_io_error("write cutout", path_ref, &e))
    }

    /// Encoded bytes as a `data:<mime>;base64,` URL
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            OutputFormatHandler::mime_type(self.format),
            STANDARD.encode(&self.data)
        )
    }

    /// Get timing summary for display
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.metadata.timings;
        format!(
            "Total: {}ms | Resize: {}ms | Segmentation: {}ms ({:.1}%) | Postprocess: {}ms | Encode: {}ms",
            t.total_ms,
            t.resize_ms,
            t.segmentation_ms,
            t.segmentation_ratio() * 100.0,
            t.postprocessing_ms,
            t.encode_ms
        )
    }
}
