//! Reflection correction pipeline
//!
//! Runs every stage on one decoded image, entirely in memory:
//!
//! 1. Synthesize the kernel and reduction steps from the scan DPI
//! 2. Surround the image with a one-inch margin of edge reflectance
//! 3. Reduce the padded image to kernel resolution
//! 4. Estimate reflected light (one parallel task per channel)
//! 5. Reconstruct it at full resolution and remove (or add) it
//! 6. Optionally normalize the white point
//!
//! Nothing is written anywhere; the caller encodes the result only after
//! the whole plane has been computed.

use std::time::Instant;
use tracing::info;

use crate::config::CorrectionConfig;
use crate::correct::{CorrectionPlane, Corrector};
use crate::error::{ReflFixError, Result};
use crate::estimate::ReflectionEstimator;
use crate::kernel::KernelSynthesizer;
use crate::plane::{expand_with_margin, PixelPlane};
use crate::reduce::MultiResolutionReducer;
use crate::white_point::WhitePointNormalizer;

// ============================================================
// Progress
// ============================================================

/// Receives stage notifications while the pipeline runs
pub trait ProgressCallback {
    /// A stage is about to start
    fn on_step_start(&self, step: &str);

    /// A stage finished; `message` summarizes it
    fn on_step_complete(&self, step: &str, message: &str);

    /// Extra diagnostic detail
    fn on_debug(&self, _message: &str) {}
}

/// Progress callback that ignores everything
pub struct NoopProgress;

impl ProgressCallback for NoopProgress {
    fn on_step_start(&self, _step: &str) {}
    fn on_step_complete(&self, _step: &str, _message: &str) {}
}

// ============================================================
// Output
// ============================================================

/// Diagnostic planes produced along the way
#[derive(Debug, Clone)]
pub struct Intermediates {
    /// Reflectance kernel
    pub kernel: PixelPlane,

    /// Padded image at kernel resolution
    pub reduced: PixelPlane,

    /// Low-resolution reflected-light estimate
    pub correction: PixelPlane,
}

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct CorrectionOutput {
    /// Corrected (or simulated) image
    pub image: PixelPlane,

    /// Factor applied by white-point normalization, if it ran
    pub white_point_scale: Option<f32>,

    /// Diagnostic planes, when requested
    pub intermediates: Option<Intermediates>,
}

// ============================================================
// Pipeline
// ============================================================

/// Reflection correction pipeline
#[derive(Debug, Clone)]
pub struct ReflectionPipeline {
    config: CorrectionConfig,
    keep_intermediates: bool,
}

impl ReflectionPipeline {
    /// Create a pipeline, validating `config`
    pub fn new(config: CorrectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            keep_intermediates: false,
        })
    }

    /// Keep the kernel, reduced image and correction plane
    #[must_use]
    pub fn with_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    /// Get the config
    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    /// Process one image
    pub fn process(&self, image: PixelPlane) -> Result<CorrectionOutput> {
        self.process_with_progress(image, &NoopProgress)
    }

    /// Process one image, reporting each stage to `progress`
    ///
    /// The correction plane is sampled at the reduction actually applied, so
    /// with a kernel resolution override (no reduction) the ratio is 1 rather
    /// than `image.dpi / kernel resolution`.
    pub fn process_with_progress(
        &self,
        mut image: PixelPlane,
        progress: &dyn ProgressCallback,
    ) -> Result<CorrectionOutput> {
        if image.dpi == 0 {
            return Err(ReflFixError::InvalidArgument(
                "image has no resolution".to_string(),
            ));
        }
        if image.is_empty() {
            return Err(ReflFixError::GeometryMismatch("image is empty".to_string()));
        }
        info!(
            mode = ?self.config.mode,
            rows = image.rows(),
            cols = image.cols(),
            dpi = image.dpi,
            "starting reflection correction"
        );

        let step = "Kernel synthesis";
        let started = Self::start(progress, step);
        let (kernel, factors) =
            KernelSynthesizer::synthesize(image.dpi, self.config.kernel_resolution_override)?;
        Self::complete(
            progress,
            step,
            started,
            &format!("{}x{} at {} dpi", kernel.size(), kernel.size(), kernel.resolution()),
        );

        let step = "Margin expansion";
        let started = Self::start(progress, step);
        let margin = image.dpi as usize;
        let reduction = factors.total();
        let padded = expand_with_margin(&image, margin, self.config.edge_reflectance, reduction)?;
        progress.on_debug(&format!(
            "padded {}x{} to {}x{}",
            image.rows(),
            image.cols(),
            padded.rows(),
            padded.cols()
        ));
        Self::complete(progress, step, started, &format!("{} px margin", margin));

        let step = "Downsampling";
        let started = Self::start(progress, step);
        let reduced = MultiResolutionReducer::reduce_by(&padded, factors)?;
        drop(padded);
        Self::complete(
            progress,
            step,
            started,
            &format!("{}x{} at {} dpi", reduced.rows(), reduced.cols(), reduced.dpi),
        );

        let step = "Reflection estimate";
        let started = Self::start(progress, step);
        let estimate = ReflectionEstimator::generate(&reduced, &kernel)?;
        Self::complete(
            progress,
            step,
            started,
            &format!("{}x{} correction plane", estimate.rows(), estimate.cols()),
        );

        let intermediates = self.keep_intermediates.then(|| Intermediates {
            kernel: kernel.plane().clone(),
            reduced,
            correction: estimate.clone(),
        });

        let step = "Correction";
        let started = Self::start(progress, step);
        let ratio = reduction as f32;
        let origin = margin as f32 / ratio - kernel.radius() as f32;
        let correction = CorrectionPlane::new(estimate, ratio)?.with_origin(origin);
        Corrector::apply(&mut image, &correction, &self.config);
        Self::complete(progress, step, started, &format!("ratio {}", reduction));

        let white_point_scale = if self.config.white_point_adjust {
            let step = "White point";
            let started = Self::start(progress, step);
            let scale = WhitePointNormalizer::normalize(&mut image);
            let message = match scale {
                Some(s) => format!("scaled by {:.4}", s),
                None => "skipped".to_string(),
            };
            Self::complete(progress, step, started, &message);
            scale
        } else {
            None
        };

        Ok(CorrectionOutput {
            image,
            white_point_scale,
            intermediates,
        })
    }

    fn start(progress: &dyn ProgressCallback, step: &str) -> Instant {
        progress.on_step_start(step);
        Instant::now()
    }

    fn complete(progress: &dyn ProgressCallback, step: &str, started: Instant, message: &str) {
        let elapsed = started.elapsed();
        info!(step, elapsed_ms = elapsed.as_millis() as u64, "{}", message);
        progress.on_step_complete(step, &format!("{} ({:.3}s)", message, elapsed.as_secs_f64()));
    }
}

// ============================================================
// Tests
// ============================================================
