//! scanner-refl-fix - Re-reflected light correction for flatbed scans
//!
//! Epson V800/V850 scanners bounce light reflected by the page off the lid
//! and back onto nearby areas, so dark patches next to white paper scan
//! lighter than they are. This crate estimates that light from the scan
//! itself and removes it (or, for testing, adds it).
//!
//! # Modules
//!
//! - [`plane`]: Three-channel floating-point image planes
//! - [`kernel`]: Reflectance kernel synthesis
//! - [`reduce`]: Box-filter downsampling to kernel resolution
//! - [`estimate`]: Reflected-light estimation by correlation
//! - [`correct`]: Bilinear reconstruction and per-pixel correction
//! - [`white_point`]: Optional white-point normalization
//! - [`pipeline`]: The stages chained together
//! - [`io`]: TIFF and raster decode/encode
//! - [`config`]: Correction settings and config file loading
//! - [`cli`]: Command-line arguments
//!
//! # Example
//!
//! ```rust,no_run
//! use scanner_refl_fix::{io, CorrectionConfig, ReflectionPipeline, SCANNER_GAMMA};
//! use std::path::Path;
//!
//! let image = io::read_image(Path::new("scan.tif"), SCANNER_GAMMA, 300).unwrap();
//! let depth = image.bit_depth;
//! let pipeline = ReflectionPipeline::new(CorrectionConfig::default()).unwrap();
//! let output = pipeline.process(image).unwrap();
//! io::write_image(Path::new("fixed.tif"), &output.image, depth).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod correct;
pub mod error;
pub mod estimate;
pub mod io;
pub mod kernel;
pub mod pipeline;
pub mod plane;
pub mod reduce;
pub mod white_point;

// CLI exports
pub use cli::{exit_codes, Cli};

// Config exports
pub use config::{
    CliOverrides, Config, CorrectionConfig, CorrectionConfigBuilder, OutputOptions, RunConfig,
    ADOBE_RGB_GAMMA, DEFAULT_EDGE_REFLECTANCE, INTERMEDIATE_GAMMA, SCANNER_GAMMA,
};

// Error exports
pub use error::{ReflFixError, Result};

// Core exports
pub use correct::{CorrectionMode, CorrectionPlane, Corrector};
pub use estimate::ReflectionEstimator;
pub use kernel::{DownsampleFactors, Kernel, KernelModel, KernelSynthesizer};
pub use plane::{average_planes, expand_with_margin, BitDepth, PixelPlane, CHANNELS};
pub use reduce::MultiResolutionReducer;
pub use white_point::WhitePointNormalizer;

// Pipeline exports
pub use pipeline::{
    CorrectionOutput, Intermediates, NoopProgress, ProgressCallback, ReflectionPipeline,
};
