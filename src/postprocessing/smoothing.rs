//! Five-tap edge smoothing of partially transparent pixels

use crate::types::AlphaBuffer;

/// Weight of the center sample in the smoothing numerator
pub const CENTER_WEIGHT: u32 = 2;

/// Divisor applied to the weighted sum of center and four neighbours
pub const SMOOTHING_DIVISOR: u32 = 5;

/// Softens opacity discontinuities along the cutout edge
///
/// Only interior pixels with `0 < alpha < 255` are rewritten, using
/// `round((2 * center + up + down + left + right) / 5)` over the values from
/// before the pass. Border rows and columns are never touched.
pub struct EdgeSmoother;

impl EdgeSmoother {
    /// Smooth an alpha buffer, returning the new buffer
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    // Safe: loop bounds keep every neighbour inside the buffer
    pub fn smooth(alpha: &AlphaBuffer) -> AlphaBuffer {
        let (height, width) = alpha.dim();
        let mut smoothed = alpha.clone();
        if height < 3 || width < 3 {
            return smoothed;
        }

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let center = alpha[[y, x]];
                if center == 0 || center == u8::MAX {
                    continue;
                }

                let neighbours = u32::from(alpha[[y - 1, x]])
                    + u32::from(alpha[[y + 1, x]])
                    + u32::from(alpha[[y, x - 1]])
                    + u32::from(alpha[[y, x + 1]]);
                let sum = CENTER_WEIGHT * u32::from(center) + neighbours;
                // Integer round-half-up of sum / divisor
                let value = (sum * 2 + SMOOTHING_DIVISOR) / (SMOOTHING_DIVISOR * 2);
                smoothed[[y, x]] = value.min(u32::from(u8::MAX)) as u8;
            }
        }

        smoothed
    }
}
