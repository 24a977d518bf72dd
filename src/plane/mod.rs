//! Pixel plane module
//!
//! In-memory RGB raster shared by every stage of the pipeline, plus the
//! helpers that shape it before correction:
//!
//! - **Margin expansion** ([`expand_with_margin`]) - surround the scan with
//!   the assumed bed reflectance
//! - **Averaging** ([`average_planes`]) - merge repeated scans

mod average;
mod types;

pub use average::average_planes;
pub use types::{BitDepth, PixelPlane, CHANNELS};

use crate::error::{ReflFixError, Result};

/// Surround `image` with a `margin`-wide border filled with `fill`
///
/// The bottom and right edges are extended further, with the same fill,
/// until both dimensions are multiples of `align`.
pub fn expand_with_margin(
    image: &PixelPlane,
    margin: usize,
    fill: f32,
    align: usize,
) -> Result<PixelPlane> {
    if align == 0 {
        return Err(ReflFixError::InvalidArgument(
            "alignment must be at least 1".to_string(),
        ));
    }
    let rows = (image.rows() + 2 * margin).div_ceil(align) * align;
    let cols = (image.cols() + 2 * margin).div_ceil(align) * align;

    let mut expanded =
        PixelPlane::filled(rows, cols, image.dpi, [fill; CHANNELS]).with_metadata_of(image);
    expanded.insert(image, margin, margin)?;
    Ok(expanded)
}
