//! Full-resolution reconstruction and correction
//!
//! The low-resolution correction plane is sampled bilinearly at every
//! full-resolution pixel, and the estimated reflected light is removed
//! (or, in simulate mode, added) multiplicatively.
//!
//! # Per-pixel algebra
//!
//! - Correct: `(v - k * v) * GAIN_RESTORE_RATIO`, clamped to [0, 1]
//! - Simulate: `(v + k * v) * SIMULATE_RATIO`, clamped to [0, 1]
//!
//! Away from the clamp limits the two are approximate inverses.

use tracing::debug;

use crate::config::CorrectionConfig;
use crate::error::{ReflFixError, Result};
use crate::plane::{PixelPlane, CHANNELS};

// ============================================================
// Constants
// ============================================================

/// Empirical gain-restore numerator, fitted to keep L* of measured patches
pub const GAIN_RESTORE_NUMERATOR: f32 = 0.876;

/// Empirical gain-restore denominator
pub const GAIN_RESTORE_DENOMINATOR: f32 = 0.785;

/// Gain applied after subtracting the reflected light
pub const GAIN_RESTORE_RATIO: f32 = GAIN_RESTORE_NUMERATOR / GAIN_RESTORE_DENOMINATOR;

/// Gain applied after adding reflected light in simulate mode
pub const SIMULATE_RATIO: f32 = GAIN_RESTORE_DENOMINATOR / GAIN_RESTORE_NUMERATOR;

// ============================================================
// Types
// ============================================================

/// Direction of the correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionMode {
    /// Remove the scanner's re-reflected light
    #[default]
    Correct,

    /// Add re-reflected light, producing an image as the scanner would see it
    Simulate,
}

/// Low-resolution correction plane positioned over a full-resolution image
#[derive(Debug, Clone)]
pub struct CorrectionPlane {
    plane: PixelPlane,

    /// Full-resolution pixels per correction cell
    ratio: f32,

    /// Correction-cell coordinate of full-resolution pixel (0, 0)
    origin: f32,
}

impl CorrectionPlane {
    /// Wrap `plane`, whose cell (0, 0) sits over full-resolution pixel (0, 0)
    pub fn new(plane: PixelPlane, ratio: f32) -> Result<Self> {
        if plane.is_empty() {
            return Err(ReflFixError::GeometryMismatch(
                "correction plane is empty".to_string(),
            ));
        }
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(ReflFixError::InvalidArgument(format!(
                "reduction ratio must be positive, got {}",
                ratio
            )));
        }
        Ok(Self {
            plane,
            ratio,
            origin: 0.0,
        })
    }

    /// Shift the plane so full-resolution pixel (0, 0) maps to cell `origin`
    #[must_use]
    pub fn with_origin(mut self, origin: f32) -> Self {
        self.origin = origin;
        self
    }

    pub fn plane(&self) -> &PixelPlane {
        &self.plane
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Consume, returning the low-resolution plane
    pub fn into_plane(self) -> PixelPlane {
        self.plane
    }

    /// Bilinear sample at continuous cell coordinates
    ///
    /// Coordinates outside the plane are clamped to its edge cells.
    pub fn bilinear(&self, row: f32, col: f32, channel: usize) -> f32 {
        let (r0, r1, wr) = Self::neighbors(row, self.plane.rows());
        let (c0, c1, wc) = Self::neighbors(col, self.plane.cols());

        (1.0 - wr) * (1.0 - wc) * self.plane.get(r0, c0, channel)
            + wr * (1.0 - wc) * self.plane.get(r1, c0, channel)
            + (1.0 - wr) * wc * self.plane.get(r0, c1, channel)
            + wr * wc * self.plane.get(r1, c1, channel)
    }

    /// Correction value for full-resolution pixel (row, col)
    #[inline]
    pub fn at(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.bilinear(
            row as f32 / self.ratio + self.origin,
            col as f32 / self.ratio + self.origin,
            channel,
        )
    }

    fn neighbors(coord: f32, len: usize) -> (usize, usize, f32) {
        let last = len - 1;
        let x = coord.clamp(0.0, last as f32);
        let i0 = (x.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        (i0, i1, x - i0 as f32)
    }
}

// ============================================================
// Corrector
// ============================================================

/// Applies the correction algebra at full resolution
pub struct Corrector;

impl Corrector {
    /// Corrected value of one sample given its correction value
    #[inline]
    pub fn correct_sample(
        original: f32,
        correction: f32,
        mode: CorrectionMode,
        gain_restore: bool,
    ) -> f32 {
        let value = match mode {
            CorrectionMode::Correct => {
                let gain = if gain_restore { GAIN_RESTORE_RATIO } else { 1.0 };
                (original - correction * original) * gain
            }
            CorrectionMode::Simulate => (original + correction * original) * SIMULATE_RATIO,
        };
        value.clamp(0.0, 1.0)
    }

    /// Correct every sample of `image` in place
    pub fn apply(image: &mut PixelPlane, correction: &CorrectionPlane, config: &CorrectionConfig) {
        let cols = image.cols();
        for c in 0..CHANNELS {
            let samples = image.channel_mut(c);
            for (i, v) in samples.iter_mut().enumerate() {
                let k = correction.at(i / cols, i % cols, c);
                *v = Self::correct_sample(*v, k, config.mode, config.gain_restore);
            }
        }
        debug!(
            mode = ?config.mode,
            gain_restore = config.gain_restore,
            "applied reflection correction"
        );
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_plane(rows: usize, cols: usize) -> PixelPlane {
        let mut plane = PixelPlane::new(rows, cols, 50);
        for r in 0..rows {
            for c in 0..cols {
                for ch in 0..CHANNELS {
                    plane.set(r, c, ch, (r * 10 + c) as f32 * 0.01 + ch as f32);
                }
            }
        }
        plane
    }

    #[test]
    fn test_gain_constants() {
        assert!((GAIN_RESTORE_RATIO - 0.876 / 0.785).abs() < 1e-7);
        assert!((GAIN_RESTORE_RATIO * SIMULATE_RATIO - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_exact_at_grid_points() {
        let plane = CorrectionPlane::new(ramp_plane(4, 5), 6.0).unwrap();
        for r in 0..4 {
            for c in 0..5 {
                for ch in 0..CHANNELS {
                    let expected = plane.plane().get(r, c, ch);
                    assert!((plane.bilinear(r as f32, c as f32, ch) - expected).abs() < 1e-6);
                    assert!((plane.at(r * 6, c * 6, ch) - expected).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_bilinear_midpoint() {
        let mut low = PixelPlane::new(2, 2, 50);
        low.set(0, 0, 0, 0.0);
        low.set(1, 0, 0, 0.4);
        low.set(0, 1, 0, 0.2);
        low.set(1, 1, 0, 0.6);
        let plane = CorrectionPlane::new(low, 2.0).unwrap();
        assert!((plane.bilinear(0.5, 0.5, 0) - 0.3).abs() < 1e-6);
        assert!((plane.at(1, 0, 0) - 0.2).abs() < 1e-6);
        assert!((plane.bilinear(0.25, 0.0, 0) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_clamps_at_edges() {
        let plane = CorrectionPlane::new(ramp_plane(3, 3), 1.0).unwrap();
        let corner = plane.plane().get(2, 2, 0);
        assert!((plane.bilinear(10.0, 10.0, 0) - corner).abs() < 1e-6);
        assert!((plane.bilinear(-3.0, -1.0, 0) - plane.plane().get(0, 0, 0)).abs() < 1e-6);
        assert!((plane.at(2, 7, 1) - plane.plane().get(2, 2, 1)).abs() < 1e-6);
    }

    #[test]
    fn test_origin_shift() {
        let plane = CorrectionPlane::new(ramp_plane(4, 4), 1.0)
            .unwrap()
            .with_origin(1.0);
        assert!((plane.at(0, 0, 0) - plane.plane().get(1, 1, 0)).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_plane() {
        assert!(CorrectionPlane::new(PixelPlane::new(0, 0, 50), 2.0).is_err());
        assert!(CorrectionPlane::new(PixelPlane::new(1, 1, 50), 0.0).is_err());
    }

    #[test]
    fn test_correct_sample_normal_mode() {
        let v = Corrector::correct_sample(0.5, 0.1, CorrectionMode::Correct, false);
        assert!((v - 0.45).abs() < 1e-6);

        let v = Corrector::correct_sample(0.5, 0.1, CorrectionMode::Correct, true);
        assert!((v - 0.45 * GAIN_RESTORE_RATIO).abs() < 1e-6);
    }

    #[test]
    fn test_correct_sample_simulate_mode() {
        let v = Corrector::correct_sample(0.5, 0.1, CorrectionMode::Simulate, true);
        assert!((v - 0.55 * SIMULATE_RATIO).abs() < 1e-6);
        // gain restore flag does not affect simulation
        let w = Corrector::correct_sample(0.5, 0.1, CorrectionMode::Simulate, false);
        assert_eq!(v, w);
    }

    #[test]
    fn test_correct_sample_clamps() {
        assert_eq!(Corrector::correct_sample(0.99, 0.0, CorrectionMode::Correct, true), 1.0);
        assert_eq!(Corrector::correct_sample(0.5, 1.5, CorrectionMode::Correct, true), 0.0);
        assert_eq!(Corrector::correct_sample(1.0, 0.5, CorrectionMode::Simulate, true), 1.0);
    }

    #[test]
    fn test_round_trip_correct_then_simulate() {
        let k = 0.02;
        let corrected = Corrector::correct_sample(0.5, k, CorrectionMode::Correct, true);
        let back = Corrector::correct_sample(corrected, k, CorrectionMode::Simulate, true);
        assert!((back - 0.5).abs() < 1e-3, "got {}", back);

        let simulated = Corrector::correct_sample(0.5, k, CorrectionMode::Simulate, true);
        let back = Corrector::correct_sample(simulated, k, CorrectionMode::Correct, true);
        assert!((back - 0.5).abs() < 1e-3, "got {}", back);
    }

    #[test]
    fn test_gain_restore_disabled_yields_darker_sample() {
        for k in [0.01f32, 0.05, 0.1, 0.2, 0.5] {
            let with = Corrector::correct_sample(0.5, k, CorrectionMode::Correct, true);
            let without = Corrector::correct_sample(0.5, k, CorrectionMode::Correct, false);
            assert!(without < with, "k {}: {} vs {}", k, without, with);
            assert!(without < 0.5);
        }
    }

    #[test]
    fn test_apply_uniform() {
        let mut image = PixelPlane::filled(12, 12, 300, [0.5; 3]);
        let low = PixelPlane::filled(2, 2, 50, [0.1; 3]);
        let correction = CorrectionPlane::new(low, 6.0).unwrap();
        let config = CorrectionConfig::builder().gain_restore(false).build();

        Corrector::apply(&mut image, &correction, &config);
        for c in 0..CHANNELS {
            for &v in image.channel(c) {
                assert!((v - 0.45).abs() < 1e-6);
            }
        }
    }
}
