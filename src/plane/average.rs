//! Sample-wise averaging of repeated scans of the same original

use tracing::debug;

use super::types::PixelPlane;
use crate::error::{ReflFixError, Result};

/// Average several planes of identical geometry
///
/// Metadata (dpi, depth, gamma, profile) comes from the first plane.
pub fn average_planes(planes: Vec<PixelPlane>) -> Result<PixelPlane> {
    let mut iter = planes.into_iter();
    let mut acc = iter
        .next()
        .ok_or_else(|| ReflFixError::InvalidArgument("no images to average".to_string()))?;

    let mut count = 1usize;
    for plane in iter {
        if !acc.same_geometry(&plane) {
            return Err(ReflFixError::GeometryMismatch(format!(
                "additional input is {}x{}, first input is {}x{}",
                plane.rows(),
                plane.cols(),
                acc.rows(),
                acc.cols()
            )));
        }
        for c in 0..3 {
            for (a, b) in acc.channel_mut(c).iter_mut().zip(plane.channel(c)) {
                *a += *b;
            }
        }
        count += 1;
    }

    if count > 1 {
        debug!(count, "averaged input images");
        acc.scale(1.0 / count as f32);
    }
    Ok(acc)
}
