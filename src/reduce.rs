//! Integer-factor box-filter decimation
//!
//! The reflected light varies slowly across the bed, so the estimate is
//! computed on an image reduced to the kernel's native resolution. Each
//! output sample is the mean of a `factor x factor` input block.

use tracing::debug;

use crate::error::{ReflFixError, Result};
use crate::kernel::DownsampleFactors;
use crate::plane::{PixelPlane, CHANNELS};

/// Reduction factors the reducer accepts
pub const SUPPORTED_FACTORS: [usize; 2] = [2, 3];

/// Box-filter decimation of padded images
pub struct MultiResolutionReducer;

impl MultiResolutionReducer {
    /// Reduce `image` by `factor` in both dimensions
    ///
    /// The image dimensions must be exact multiples of `factor`. The dpi of
    /// the result is divided by `factor`; other metadata is kept.
    pub fn downsample(image: &PixelPlane, factor: usize) -> Result<PixelPlane> {
        if !SUPPORTED_FACTORS.contains(&factor) {
            return Err(ReflFixError::InvalidArgument(format!(
                "downsample factor must be 2 or 3, got {}",
                factor
            )));
        }
        if image.rows() % factor != 0 || image.cols() % factor != 0 {
            return Err(ReflFixError::GeometryMismatch(format!(
                "{}x{} is not a multiple of {}",
                image.rows(),
                image.cols(),
                factor
            )));
        }

        let rows = image.rows() / factor;
        let cols = image.cols() / factor;
        let src_cols = image.cols();
        let norm = 1.0 / (factor * factor) as f32;

        let mut out = PixelPlane::new(rows, cols, 0).with_metadata_of(image);
        out.dpi = image.dpi / factor as u32;

        for c in 0..CHANNELS {
            let src = image.channel(c);
            let dst = out.channel_mut(c);
            for r in 0..rows {
                for col in 0..cols {
                    let mut sum = 0.0f32;
                    for dr in 0..factor {
                        let base = (r * factor + dr) * src_cols + col * factor;
                        sum += src[base..base + factor].iter().sum::<f32>();
                    }
                    dst[r * cols + col] = sum * norm;
                }
            }
        }
        Ok(out)
    }

    /// Apply every step of `factors`, divide-by-3 steps first
    pub fn reduce_by(image: &PixelPlane, factors: DownsampleFactors) -> Result<PixelPlane> {
        let mut reduced = image.clone();
        for factor in factors.sequence() {
            reduced = Self::downsample(&reduced, factor)?;
        }
        debug!(
            rows = reduced.rows(),
            cols = reduced.cols(),
            dpi = reduced.dpi,
            "reduced working image"
        );
        Ok(reduced)
    }
}
