//! Threshold and power-curve mapping from fused confidence to opacity

use crate::error::{CutoutError, Result};
use crate::types::{AlphaBuffer, ConfidenceMask};
use serde::{Deserialize, Serialize};

/// Confidence below which a pixel is fully transparent
pub const ALPHA_THRESHOLD: f32 = 0.3;

/// Exponent applied to the normalized confidence above the threshold
pub const ALPHA_EXPONENT: f32 = 0.7;

/// Maps a confidence in [0,1] to an 8-bit opacity
///
/// Confidences below `threshold` become 0. Above it the value is rescaled onto
/// [0,1] and raised to `exponent`; an exponent below 1 lifts the curve near the
/// threshold so the silhouette fades instead of stepping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaCurve {
    pub threshold: f32,
    pub exponent: f32,
}

impl Default for AlphaCurve {
    fn default() -> Self {
        Self {
            threshold: ALPHA_THRESHOLD,
            exponent: ALPHA_EXPONENT,
        }
    }
}

impl AlphaCurve {
    #[must_use]
    pub fn new(threshold: f32, exponent: f32) -> Self {
        Self {
            threshold,
            exponent,
        }
    }

    /// Check that the curve is well defined
    ///
    /// # Errors
    /// - Threshold outside `[0, 1)`
    /// - Exponent not finite or not positive
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(CutoutError::config_value_error(
                "alpha threshold",
                self.threshold,
                "0.0-<1.0",
                Some(ALPHA_THRESHOLD),
            ));
        }
        if !self.exponent.is_finite() || self.exponent <= 0.0 {
            return Err(CutoutError::config_value_error(
                "alpha exponent",
                self.exponent,
                ">0.0",
                Some(ALPHA_EXPONENT),
            ));
        }
        Ok(())
    }

    /// Opacity for a single confidence value
    #[must_use]
    pub fn opacity(&self, confidence: f32) -> u8 {
        // NaN falls through to 0
        let c = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        if c < self.threshold {
            return 0;
        }

        let normalized = (c - self.threshold) / (1.0 - self.threshold);
        let value = (normalized.powf(self.exponent) * 255.0).round();
        value.clamp(0.0, 255.0) as u8
    }

    /// Map a whole confidence map to an alpha buffer of the same shape
    #[must_use]
    pub fn apply(&self, confidence: &ConfidenceMask) -> AlphaBuffer {
        confidence.mapv(|c| self.opacity(c))
    }
}
