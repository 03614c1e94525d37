//! CPU-only tail of the pipeline: fuse, map, smooth, composite
//!
//! Every stage here is synchronous and deterministic; none of them performs
//! I/O or holds state between images.

pub mod alpha;
pub mod composite;
pub mod fusion;
pub mod smoothing;

pub use alpha::{AlphaCurve, ALPHA_EXPONENT, ALPHA_THRESHOLD};
pub use composite::Compositor;
pub use fusion::{MaskFuser, EXCLUDED_LABELS};
pub use smoothing::{EdgeSmoother, CENTER_WEIGHT, SMOOTHING_DIVISOR};

use crate::error::{CutoutError, Result};
use crate::services::progress::{ProcessingStage, ProgressTracker};
use crate::types::SegmentationOutput;
use image::RgbaImage;
use tracing::{span, Level};

/// Turn a working raster and its segmentation into an RGBA cutout
///
/// # Errors
/// - Segmentation dimensions that do not match the image (`Malformed`)
/// - Mask shape mismatches reported by [`MaskFuser::fuse`]
pub fn postprocess(
    image: RgbaImage,
    segmentation: &SegmentationOutput,
    curve: &AlphaCurve,
) -> Result<RgbaImage> {
    postprocess_tracked(image, segmentation, curve, &mut ProgressTracker::no_op())
}

/// [`postprocess`] with a stage report before each step
pub(crate) fn postprocess_tracked(
    image: RgbaImage,
    segmentation: &SegmentationOutput,
    curve: &AlphaCurve,
    tracker: &mut ProgressTracker,
) -> Result<RgbaImage> {
    let dimensions = image.dimensions();
    if segmentation.dimensions() != dimensions {
        let (sw, sh) = segmentation.dimensions();
        return Err(CutoutError::malformed(format!(
            "segmentation is {}x{}, image is {}x{}",
            sw, sh, dimensions.0, dimensions.1
        )));
    }

    let _span = span!(
        Level::DEBUG,
        "postprocessing",
        width = dimensions.0,
        height = dimensions.1,
        segments = segmentation.len()
    )
    .entered();

    tracker.report_stage(ProcessingStage::MaskFusion);
    let fused = MaskFuser::fuse(segmentation.segments(), dimensions)?;

    tracker.report_stage(ProcessingStage::AlphaMapping);
    let alpha = curve.apply(&fused);

    tracker.report_stage(ProcessingStage::EdgeSmoothing);
    let smoothed = EdgeSmoother::smooth(&alpha);

    tracker.report_stage(ProcessingStage::Compositing);
    Compositor::composite(image, &smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_postprocess_center_blob() {
        let image = RgbaImage::from_pixel(5, 5, Rgba([200, 100, 50, 255]));
        let mut mask = vec![0.0f32; 25];
        mask[12] = 1.0;
        let segmentation = SegmentationOutput::new(5, 5)
            .with_segment("person", 0.9, Some(&mask))
            .unwrap();

        let out = postprocess(image, &segmentation, &AlphaCurve::default()).unwrap();
        // Fully opaque center is never smoothed
        assert_eq!(out.get_pixel(2, 2), &Rgba([200, 100, 50, 255]));
        assert_eq!(out.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_postprocess_dimension_mismatch() {
        let image = RgbaImage::new(4, 4);
        let segmentation = SegmentationOutput::new(2, 2)
            .with_segment("person", 0.9, Some(&[1.0; 4]))
            .unwrap();
        let err = postprocess(image, &segmentation, &AlphaCurve::default()).unwrap_err();
        assert!(err.is_segmentation());
    }
}
