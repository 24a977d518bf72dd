//! Reflected-light estimation
//!
//! Correlates the reduced, padded image with the reflectance kernel in
//! "valid" mode. Each output cell is the fraction of light the scanner adds
//! at that location from its surround.
//!
//! The work fans out into one task per color channel. Tasks share the
//! image and kernel read-only and each produces its own output buffer; all
//! three are joined, and any failure is returned, before the plane is built.
//!
//! Cost is O(rows * cols * size^2) per channel, which is why the image is
//! reduced to kernel resolution first.

use rayon::prelude::*;
use tracing::debug;

use crate::error::{ReflFixError, Result};
use crate::kernel::Kernel;
use crate::plane::{PixelPlane, CHANNELS};

/// Produces the low-resolution correction plane
pub struct ReflectionEstimator;

impl ReflectionEstimator {
    /// Correlate `reduced` with `kernel`
    ///
    /// The result has `(rows - size + 1) x (cols - size + 1)` cells and the
    /// metadata of `reduced`.
    pub fn generate(reduced: &PixelPlane, kernel: &Kernel) -> Result<PixelPlane> {
        let size = kernel.size();
        if reduced.rows() < size || reduced.cols() < size {
            return Err(ReflFixError::GeometryMismatch(format!(
                "{}x{} image is smaller than the {}x{} kernel",
                reduced.rows(),
                reduced.cols(),
                size,
                size
            )));
        }
        let rows = reduced.rows() - size + 1;
        let cols = reduced.cols() - size + 1;

        let channels: Vec<Vec<f32>> = (0..CHANNELS)
            .into_par_iter()
            .map(|c| Self::correlate_channel(reduced, kernel, c, rows, cols))
            .collect::<Result<Vec<_>>>()?;
        let channels = into_channel_array(channels)?;

        debug!(rows, cols, kernel = size, "estimated reflected light");
        Ok(PixelPlane::from_channels(rows, cols, reduced.dpi, channels)?.with_metadata_of(reduced))
    }

    fn correlate_channel(
        image: &PixelPlane,
        kernel: &Kernel,
        channel: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Vec<f32>> {
        let size = kernel.size();
        let src = image.channel(channel);
        let src_cols = image.cols();
        let weights = kernel.plane().channel(channel);

        let mut out = vec![0.0f32; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                let mut sum = 0.0f32;
                for kr in 0..size {
                    let start = (r + kr) * src_cols + c;
                    let window = &src[start..start + size];
                    let krow = &weights[kr * size..(kr + 1) * size];
                    sum += window.iter().zip(krow).map(|(a, b)| a * b).sum::<f32>();
                }
                out[r * cols + c] = sum;
            }
        }

        if let Some(pos) = out.iter().position(|v| !v.is_finite()) {
            return Err(ReflFixError::InvalidArgument(format!(
                "channel {} has a non-finite reflected-light estimate at ({}, {})",
                channel,
                pos / cols,
                pos % cols
            )));
        }
        Ok(out)
    }
}

/// Exactly one buffer per color channel
fn into_channel_array(channels: Vec<Vec<f32>>) -> Result<[Vec<f32>; CHANNELS]> {
    <[Vec<f32>; CHANNELS]>::try_from(channels).map_err(|rest| {
        ReflFixError::GeometryMismatch(format!(
            "expected {} channel estimates, got {}",
            CHANNELS,
            rest.len()
        ))
    })
}
