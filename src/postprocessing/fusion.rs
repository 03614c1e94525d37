//! Reduction of labeled masks into a single foreground confidence map

use crate::error::{CutoutError, Result};
use crate::types::{ConfidenceMask, Segment};
use ndarray::{Array2, Zip};
use tracing::{debug, trace};

/// Labels never treated as foreground, compared case-insensitively
pub const EXCLUDED_LABELS: [&str; 3] = ["background", "wall", "floor"];

/// Fuses segment masks by per-pixel maximum over foreground labels
pub struct MaskFuser;

impl MaskFuser {
    /// Whether a label is part of the fixed exclusion set
    #[must_use]
    pub fn is_excluded(label: &str) -> bool {
        let lowered = label.to_lowercase();
        EXCLUDED_LABELS.iter().any(|excluded| *excluded == lowered)
    }

    /// Labels that take part in fusion, in input order
    pub fn included_labels<'a, I>(segments: I) -> Vec<String>
    where
        I: IntoIterator<Item = Segment<'a>>,
    {
        segments
            .into_iter()
            .filter(|segment| segment.mask.is_some() && !Self::is_excluded(segment.label))
            .map(|segment| segment.label.to_string())
            .collect()
    }

    /// Per-pixel maximum over all included segment masks
    ///
    /// Excluded labels and segments without mask data are skipped. If nothing
    /// is included the result is all zeros, which renders fully transparent.
    ///
    /// # Errors
    /// - A mask whose shape differs from `(height, width)`
    pub fn fuse<'a, I>(segments: I, dimensions: (u32, u32)) -> Result<ConfidenceMask>
    where
        I: IntoIterator<Item = Segment<'a>>,
    {
        let (width, height) = dimensions;
        let shape = (height as usize, width as usize);
        let mut fused = Array2::<f32>::zeros(shape);

        for segment in segments {
            if Self::is_excluded(segment.label) {
                trace!(label = segment.label, "Excluding segment from foreground");
                continue;
            }
            let Some(mask) = segment.mask else {
                trace!(label = segment.label, "Skipping segment without mask data");
                continue;
            };
            if mask.dim() != shape {
                return Err(CutoutError::malformed(format!(
                    "mask for '{}' is {}x{}, expected {}x{}",
                    segment.label,
                    mask.ncols(),
                    mask.nrows(),
                    width,
                    height
                )));
            }

            debug!(
                label = segment.label,
                score = segment.score,
                "Including segment"
            );
            Zip::from(&mut fused).and(mask).for_each(|acc, &value| {
                *acc = acc.max(value);
            });
        }

        Ok(fused)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SegmentationOutput;

    fn output(segments: &[(&str, Option<Vec<f32>>)]) -> SegmentationOutput {
        let mut out = SegmentationOutput::new(2, 2);
        for (label, mask) in segments {
            out.push_segment(*label, 0.9, mask.as_deref()).unwrap();
        }
        out
    }

    #[test]
    fn test_max_over_included_labels() {
        let out = output(&[
            ("person", Some(vec![0.2, 0.9, 0.0, 0.4])),
            ("upper-clothes", Some(vec![0.6, 0.1, 0.0, 0.5])),
        ]);
        let fused = MaskFuser::fuse(out.segments(), (2, 2)).unwrap();
        assert_eq!(fused.iter().copied().collect::<Vec<_>>(), vec![0.6, 0.9, 0.0, 0.5]);
    }

    #[test]
    fn test_excluded_labels_case_insensitive() {
        assert!(MaskFuser::is_excluded("background"));
        assert!(MaskFuser::is_excluded("Background"));
        assert!(MaskFuser::is_excluded("WALL"));
        assert!(MaskFuser::is_excluded("Floor"));
        assert!(!MaskFuser::is_excluded("person"));
        assert!(!MaskFuser::is_excluded("hair"));

        let out = output(&[
            ("person", Some(vec![0.2; 4])),
            ("Background", Some(vec![1.0; 4])),
            ("FLOOR", Some(vec![1.0; 4])),
        ]);
        let fused = MaskFuser::fuse(out.segments(), (2, 2)).unwrap();
        assert!(fused.iter().all(|&v| (v - 0.2).abs() < f32::EPSILON));
    }

    #[test]
    fn test_no_included_segments_is_all_zero() {
        let out = output(&[("background", Some(vec![1.0; 4])), ("wall", Some(vec![0.7; 4]))]);
        let fused = MaskFuser::fuse(out.segments(), (2, 2)).unwrap();
        assert!(fused.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_segments_without_mask_are_skipped() {
        let out = output(&[("hat", None), ("person", Some(vec![0.5; 4]))]);
        let fused = MaskFuser::fuse(out.segments(), (2, 2)).unwrap();
        assert!(fused.iter().all(|&v| v == 0.5));
        assert_eq!(MaskFuser::included_labels(out.segments()), vec!["person"]);
    }

    #[test]
    fn test_order_independent() {
        let masks = [
            ("person", vec![0.1, 0.8, 0.3, 0.0]),
            ("skirt", vec![0.7, 0.2, 0.3, 0.9]),
            ("background", vec![1.0, 1.0, 1.0, 1.0]),
            ("bag", vec![0.0, 0.85, 0.31, 0.2]),
        ];
        let forward = output(
            &masks
                .iter()
                .map(|(l, m)| (*l, Some(m.clone())))
                .collect::<Vec<_>>(),
        );
        let reversed = output(
            &masks
                .iter()
                .rev()
                .map(|(l, m)| (*l, Some(m.clone())))
                .collect::<Vec<_>>(),
        );
        assert_eq!(
            MaskFuser::fuse(forward.segments(), (2, 2)).unwrap(),
            MaskFuser::fuse(reversed.segments(), (2, 2)).unwrap()
        );
    }

    #[test]
    fn test_shape_mismatch_is_malformed() {
        let out = output(&[("person", Some(vec![0.5; 4]))]);
        let err = MaskFuser::fuse(out.segments(), (4, 1)).unwrap_err();
        assert!(err.is_segmentation());
    }
}
