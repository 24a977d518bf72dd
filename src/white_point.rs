//! White-point normalization
//!
//! Scales the image so its brightest ~0.01% of samples reach 1.0, like a
//! relative-colorimetric rendering that keeps the paper tint. Not meant for
//! scans of profiling targets.

use tracing::{debug, warn};

use crate::plane::{PixelPlane, CHANNELS};

/// One sample in this many is allowed above the detected white
const PERCENTILE_DIVISOR: usize = 10_000;

/// Detected whites at or below this are left alone
const MIN_WHITE: f32 = 1e-6;

/// Global percentile-based rescale
pub struct WhitePointNormalizer;

impl WhitePointNormalizer {
    /// Value at index `len - 1 - len / 10000` of the sorted channel
    pub fn channel_white(samples: &[f32]) -> Option<f32> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        Some(sorted[n - 1 - n / PERCENTILE_DIVISOR])
    }

    /// Largest per-channel white across the three channels
    pub fn detect(image: &PixelPlane) -> Option<f32> {
        (0..CHANNELS)
            .filter_map(|c| Self::channel_white(image.channel(c)))
            .reduce(f32::max)
    }

    /// Scale `image` so the detected white becomes 1.0
    ///
    /// Returns the applied factor. Samples are not clamped; values above 1.0
    /// are left for the encoder.
    pub fn normalize(image: &mut PixelPlane) -> Option<f32> {
        let white = Self::detect(image)?;
        if !(white.is_finite() && white > MIN_WHITE) {
            warn!(white, "no usable white point detected, skipping normalization");
            return None;
        }
        let factor = 1.0 / white;
        image.scale(factor);
        debug!(white, factor, "normalized white point");
        Some(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(rows: usize, cols: usize, peak: [f32; 3]) -> PixelPlane {
        let mut plane = PixelPlane::new(rows, cols, 300);
        let n = (rows * cols) as f32;
        for c in 0..CHANNELS {
            for (i, v) in plane.channel_mut(c).iter_mut().enumerate() {
                *v = peak[c] * (i as f32 + 1.0) / n;
            }
        }
        plane
    }

    #[test]
    fn test_channel_white_index() {
        let samples: Vec<f32> = (0..20_000).map(|i| i as f32).collect();
        // 20000 - 1 - 2
        assert_eq!(WhitePointNormalizer::channel_white(&samples), Some(19_997.0));

        let small = [0.3, 0.9, 0.1];
        assert_eq!(WhitePointNormalizer::channel_white(&small), Some(0.9));
        assert_eq!(WhitePointNormalizer::channel_white(&[]), None);
    }

    #[test]
    fn test_normalized_white_is_one() {
        let mut plane = gradient(120, 100, [0.6, 0.8, 0.7]);
        WhitePointNormalizer::normalize(&mut plane).unwrap();
        let white = WhitePointNormalizer::detect(&plane).unwrap();
        assert!((white - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_does_not_clamp() {
        let mut plane = gradient(200, 100, [0.5; 3]);
        // a single outlier above the percentile
        plane.set(0, 0, 0, 0.9);
        let factor = WhitePointNormalizer::normalize(&mut plane).unwrap();
        assert!(factor > 1.9);
        assert!(plane.get(0, 0, 0) > 1.0);
    }

    #[test]
    fn test_black_image_untouched() {
        let mut plane = PixelPlane::new(10, 10, 300);
        assert!(WhitePointNormalizer::normalize(&mut plane).is_none());
        assert!(plane.channel(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_image() {
        let mut plane = PixelPlane::new(0, 0, 300);
        assert!(WhitePointNormalizer::normalize(&mut plane).is_none());
    }
}
