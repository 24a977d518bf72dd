//! Reflectance kernel synthesis
//!
//! Builds the point-spread kernel describing how light reflected from the
//! roughly one-inch surround of a pixel leaks back into its measurement, and
//! picks the reduced working resolution the kernel is evaluated at.
//!
//! # Algorithm
//!
//! 1. Divide the scan DPI by 3 (while >= 90), then by 2 (while >= 60), as
//!    long as the division is exact. The result is the kernel resolution.
//! 2. Evaluate the falloff fits (400 dpi reference) on a square grid of
//!    radius one inch at that resolution, mixing the vertical and horizontal
//!    curves by each axis' share of the offset.
//! 3. Normalize so the kernel sums to [`REFLECTED_FRACTION`].
//!
//! # Example
//!
//! ```rust
//! use scanner_refl_fix::KernelSynthesizer;
//!
//! let (kernel, factors) = KernelSynthesizer::synthesize(300, None).unwrap();
//! assert_eq!(kernel.resolution(), 50);
//! assert_eq!((factors.steps_of_3, factors.steps_of_2), (1, 1));
//! ```

pub mod falloff;

use tracing::debug;

use crate::error::{ReflFixError, Result};
use crate::plane::{PixelPlane, CHANNELS};

// ============================================================
// Constants
// ============================================================

/// Fraction of incident light assumed to be re-reflected into the sensor
pub const REFLECTED_FRACTION: f32 = 0.20;

/// Resolution the falloff fits were measured at
pub const REFERENCE_DPI: f32 = 400.0;

/// Stop dividing by 3 below this resolution
const MIN_DPI_FOR_THIRDS: u32 = 90;

/// Stop dividing by 2 below this resolution
const MIN_DPI_FOR_HALVES: u32 = 60;

/// Stretch applied to the radial distance fed to the vertical fit
const VERTICAL_DISTANCE_TWEAK: f32 = 1.1;

/// Keeps the radial distance away from zero
const DISTANCE_EPSILON: f32 = 1e-7;

/// Keeps the axis-share denominator away from zero
const SHARE_EPSILON: f32 = 1e-5;

/// Legacy fit weights on squared offsets
const LEGACY_ROW_WEIGHT: f32 = 1.7;
const LEGACY_COL_WEIGHT: f32 = 1.5;

// ============================================================
// Types
// ============================================================

/// Which empirical fit the kernel is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelModel {
    /// Fit from four pages of randomly distributed 3mm white/black squares
    #[default]
    RandomSquares,

    /// Earlier radial fit from symmetric 6mm square patterns.
    ///
    /// Superseded by [`KernelModel::RandomSquares`], which matches measured
    /// scans slightly better. The pipeline never selects it; it is kept only
    /// so the two fits can be compared.
    SymmetricPatches,
}

/// How far the padded image must be reduced to reach kernel resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownsampleFactors {
    /// Number of divide-by-3 steps
    pub steps_of_3: u32,

    /// Number of divide-by-2 steps
    pub steps_of_2: u32,
}

impl DownsampleFactors {
    /// Overall linear reduction, 3^steps_of_3 * 2^steps_of_2
    pub fn total(&self) -> usize {
        3usize.pow(self.steps_of_3) * 2usize.pow(self.steps_of_2)
    }

    /// Factors in the order they are applied (all 3s, then all 2s)
    pub fn sequence(&self) -> impl Iterator<Item = usize> {
        std::iter::repeat(3)
            .take(self.steps_of_3 as usize)
            .chain(std::iter::repeat(2).take(self.steps_of_2 as usize))
    }
}

/// Square, point-symmetric, monochrome reflectance kernel
///
/// The wrapped plane has odd size `2 * radius + 1`, carries the kernel
/// resolution as its dpi and holds the same value in all three channels.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    plane: PixelPlane,
    radius: usize,
}

impl Kernel {
    /// Kernel resolution in dpi
    pub fn resolution(&self) -> u32 {
        self.plane.dpi
    }

    /// Half-width in cells; the center cell is at (radius, radius)
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Side length in cells
    pub fn size(&self) -> usize {
        2 * self.radius + 1
    }

    /// Weight at (row, col), identical for every channel
    pub fn weight(&self, row: usize, col: usize) -> f32 {
        self.plane.get(row, col, 0)
    }

    /// Underlying plane
    pub fn plane(&self) -> &PixelPlane {
        &self.plane
    }

    /// Consume the kernel, returning its plane
    pub fn into_plane(self) -> PixelPlane {
        self.plane
    }
}

// ============================================================
// Synthesizer
// ============================================================

/// Builds the reflectance kernel for a given scan resolution
pub struct KernelSynthesizer;

impl KernelSynthesizer {
    /// Build the kernel for a `dpi` scan
    ///
    /// With `resolution_override` the kernel is built directly at that
    /// resolution and no reduction steps are reported.
    pub fn synthesize(
        dpi: u32,
        resolution_override: Option<u32>,
    ) -> Result<(Kernel, DownsampleFactors)> {
        Self::synthesize_with_model(dpi, resolution_override, KernelModel::default())
    }

    /// Build the kernel with an explicit fit
    pub fn synthesize_with_model(
        dpi: u32,
        resolution_override: Option<u32>,
        model: KernelModel,
    ) -> Result<(Kernel, DownsampleFactors)> {
        if dpi == 0 {
            return Err(ReflFixError::InvalidArgument(
                "scan dpi must be positive".to_string(),
            ));
        }

        let (resolution, factors) = match resolution_override {
            Some(0) => {
                return Err(ReflFixError::InvalidArgument(
                    "kernel resolution override must be positive".to_string(),
                ))
            }
            Some(res) => (res, DownsampleFactors::default()),
            None => Self::working_resolution(dpi),
        };

        let kernel = Self::build(resolution, model);
        debug!(
            dpi,
            resolution,
            size = kernel.size(),
            steps_of_3 = factors.steps_of_3,
            steps_of_2 = factors.steps_of_2,
            "synthesized reflectance kernel"
        );
        Ok((kernel, factors))
    }

    /// Pick the reduced resolution and the steps that reach it
    pub fn working_resolution(dpi: u32) -> (u32, DownsampleFactors) {
        let mut res = dpi;
        let mut factors = DownsampleFactors::default();

        while res >= MIN_DPI_FOR_THIRDS && res % 3 == 0 {
            res /= 3;
            factors.steps_of_3 += 1;
        }
        while res >= MIN_DPI_FOR_HALVES && res % 2 == 0 {
            res /= 2;
            factors.steps_of_2 += 1;
        }
        (res, factors)
    }

    fn build(resolution: u32, model: KernelModel) -> Kernel {
        let radius = resolution as usize;
        let size = 2 * radius + 1;
        let gain = REFERENCE_DPI / resolution as f32;
        let center = radius as f32;

        let mut plane = PixelPlane::new(size, size, resolution);
        for i in 0..size {
            for j in 0..size {
                let di = i as f32 - center;
                let dj = j as f32 - center;
                let value = match model {
                    KernelModel::RandomSquares => Self::mixed_falloff(gain, di, dj),
                    KernelModel::SymmetricPatches => Self::legacy_falloff(gain, di, dj),
                }
                .max(0.0);
                for c in 0..CHANNELS {
                    plane.set(i, j, c, value);
                }
            }
        }

        let sum = plane.sum()[0];
        if sum > 0.0 {
            plane.scale((REFLECTED_FRACTION as f64 / sum) as f32);
        }
        Kernel { plane, radius }
    }

    /// Blend of the two axis fits, weighted by each axis' share of the offset
    fn mixed_falloff(gain: f32, di: f32, dj: f32) -> f32 {
        let offx = (gain * di).abs().min(falloff::FIT_RANGE);
        let offy = (gain * dj).abs().min(falloff::FIT_RANGE);
        let dist = (offx * offx + offy * offy + DISTANCE_EPSILON)
            .sqrt()
            .min(falloff::FIT_RANGE);

        let vertical = falloff::reflectance(falloff::vertical(VERTICAL_DISTANCE_TWEAK * dist));
        if offx == 0.0 && offy == 0.0 {
            return vertical;
        }
        let horizontal = falloff::reflectance(falloff::horizontal(dist));
        let total = offx + offy + SHARE_EPSILON;
        offx / total * vertical + offy / total * horizontal
    }

    fn legacy_falloff(gain: f32, di: f32, dj: f32) -> f32 {
        let dist = (LEGACY_ROW_WEIGHT * di * di + LEGACY_COL_WEIGHT * dj * dj).sqrt();
        falloff::legacy((gain * dist).min(falloff::LEGACY_FIT_RANGE))
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TESTED_DPI: [u32; 5] = [75, 150, 200, 300, 600];

    #[test]
    fn test_working_resolution() {
        let cases = [
            (75, 75, 0, 0),
            (150, 50, 1, 0),
            (200, 50, 0, 2),
            (300, 50, 1, 1),
            (600, 50, 1, 2),
            (1200, 50, 1, 3),
            (2400, 50, 1, 4),
            (6400, 50, 0, 7),
        ];
        for (dpi, res, s3, s2) in cases {
            let (got, factors) = KernelSynthesizer::working_resolution(dpi);
            assert_eq!(got, res, "dpi {}", dpi);
            assert_eq!(factors.steps_of_3, s3, "dpi {}", dpi);
            assert_eq!(factors.steps_of_2, s2, "dpi {}", dpi);
            assert_eq!(factors.total() as u32 * res, dpi);
        }
    }

    #[test]
    fn test_factor_sequence_order() {
        let factors = DownsampleFactors {
            steps_of_3: 2,
            steps_of_2: 1,
        };
        assert_eq!(factors.sequence().collect::<Vec<_>>(), vec![3, 3, 2]);
        assert_eq!(factors.total(), 18);
        assert_eq!(DownsampleFactors::default().total(), 1);
    }

    #[test]
    fn test_kernel_size_is_odd() {
        for dpi in TESTED_DPI {
            let (kernel, _) = KernelSynthesizer::synthesize(dpi, None).unwrap();
            let size = kernel.size();
            assert_eq!(size % 2, 1);
            assert_eq!(size, 2 * kernel.resolution() as usize + 1);
            assert_eq!(kernel.plane().rows(), size);
            assert_eq!(kernel.plane().cols(), size);
        }
    }

    #[test]
    fn test_kernel_point_symmetric() {
        for dpi in TESTED_DPI {
            let (kernel, _) = KernelSynthesizer::synthesize(dpi, None).unwrap();
            let n = kernel.size();
            for i in 0..n {
                for j in 0..n {
                    assert_eq!(
                        kernel.weight(i, j),
                        kernel.weight(n - 1 - i, n - 1 - j),
                        "dpi {} cell ({}, {})",
                        dpi,
                        i,
                        j
                    );
                }
            }
        }
    }

    #[test]
    fn test_kernel_sum_is_reflected_fraction() {
        for dpi in TESTED_DPI {
            let (kernel, _) = KernelSynthesizer::synthesize(dpi, None).unwrap();
            let sum = kernel.plane().sum();
            assert!(
                (sum[0] - REFLECTED_FRACTION as f64).abs() < 1e-4,
                "dpi {} sum {}",
                dpi,
                sum[0]
            );
        }
    }

    #[test]
    fn test_kernel_monochrome_and_non_negative() {
        let (kernel, _) = KernelSynthesizer::synthesize(300, None).unwrap();
        let plane = kernel.plane();
        assert_eq!(plane.channel(0), plane.channel(1));
        assert_eq!(plane.channel(0), plane.channel(2));
        assert!(plane.channel(0).iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_kernel_peaks_at_center() {
        let (kernel, _) = KernelSynthesizer::synthesize(300, None).unwrap();
        let r = kernel.radius();
        let center = kernel.weight(r, r);
        assert!(center > 0.0);
        assert!(center >= kernel.weight(r, r + 1));
        assert!(center > kernel.weight(r, r + 10));
        assert!(center > kernel.weight(0, 0));
    }

    #[test]
    fn test_kernel_deterministic() {
        let a = KernelSynthesizer::synthesize(200, None).unwrap();
        let b = KernelSynthesizer::synthesize(200, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_resolution_override() {
        let (kernel, factors) = KernelSynthesizer::synthesize(600, Some(20)).unwrap();
        assert_eq!(kernel.resolution(), 20);
        assert_eq!(kernel.size(), 41);
        assert_eq!(factors, DownsampleFactors::default());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            KernelSynthesizer::synthesize(0, None),
            Err(ReflFixError::InvalidArgument(_))
        ));
        assert!(matches!(
            KernelSynthesizer::synthesize(300, Some(0)),
            Err(ReflFixError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_legacy_model_still_normalized() {
        let (kernel, _) =
            KernelSynthesizer::synthesize_with_model(300, None, KernelModel::SymmetricPatches)
                .unwrap();
        let sum = kernel.plane().sum()[0];
        assert!((sum - REFLECTED_FRACTION as f64).abs() < 1e-4);

        let (current, _) = KernelSynthesizer::synthesize(300, None).unwrap();
        assert_ne!(kernel, current);
    }
}
