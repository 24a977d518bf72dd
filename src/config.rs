//! Configuration
//!
//! [`CorrectionConfig`] is the immutable value every core operation takes.
//! The binary assembles it from an optional TOML file and the command line,
//! with command-line values taking precedence.
//!
//! # Config file
//!
//! ```toml
//! edge_reflectance = 0.85
//! adobe_rgb = false
//! white_point_adjust = false
//! output_bits = 16
//! profile = "/path/to/scanner.icc"
//! default_dpi = 300
//! ```
//!
//! Search order: explicit `--config` path, `./scannerreflfix.toml`, then
//! `<config dir>/scanner-refl-fix/config.toml`.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::correct::CorrectionMode;
use crate::error::{ReflFixError, Result};
use crate::plane::BitDepth;

// ============================================================
// Constants
// ============================================================

/// Average reflectance assumed for the bed outside the scanned crop
pub const DEFAULT_EDGE_REFLECTANCE: f32 = 0.85;

/// Decode gamma for files straight from the scanner
pub const SCANNER_GAMMA: f32 = 1.7;

/// Decode gamma for files already converted to Adobe RGB
pub const ADOBE_RGB_GAMMA: f32 = 2.2;

/// Encode gamma for diagnostic planes
pub const INTERMEDIATE_GAMMA: f32 = 2.2;

/// Resolution assumed when an input carries none
pub const DEFAULT_DPI: u32 = 300;

/// Local config file name
pub const LOCAL_CONFIG_FILE: &str = "scannerreflfix.toml";

// ============================================================
// Correction config
// ============================================================

/// Settings consumed by the correction pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionConfig {
    /// Fill value for the one-inch margin around the scan (0.0-1.0)
    pub edge_reflectance: f32,

    /// Remove or simulate reflected light
    pub mode: CorrectionMode,

    /// Restore gain after subtraction
    pub gain_restore: bool,

    /// Rescale so the brightest 0.01% reaches full scale
    pub white_point_adjust: bool,

    /// Build the kernel at this resolution instead of the derived one
    pub kernel_resolution_override: Option<u32>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            edge_reflectance: DEFAULT_EDGE_REFLECTANCE,
            mode: CorrectionMode::Correct,
            gain_restore: true,
            white_point_adjust: false,
            kernel_resolution_override: None,
        }
    }
}

impl CorrectionConfig {
    /// Create a builder
    pub fn builder() -> CorrectionConfigBuilder {
        CorrectionConfigBuilder::default()
    }

    /// Check every value lies in its allowed domain
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.edge_reflectance) {
            return Err(ReflFixError::InvalidArgument(format!(
                "edge reflectance must be between 0 and 1, got {}",
                self.edge_reflectance
            )));
        }
        if self.kernel_resolution_override == Some(0) {
            return Err(ReflFixError::InvalidArgument(
                "kernel resolution must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for CorrectionConfig
#[derive(Debug, Default)]
pub struct CorrectionConfigBuilder {
    config: CorrectionConfig,
}

impl CorrectionConfigBuilder {
    /// Set edge reflectance
    #[must_use]
    pub fn edge_reflectance(mut self, value: f32) -> Self {
        self.config.edge_reflectance = value;
        self
    }

    /// Set correction mode
    #[must_use]
    pub fn mode(mut self, mode: CorrectionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Enable or disable gain restore
    #[must_use]
    pub fn gain_restore(mut self, enabled: bool) -> Self {
        self.config.gain_restore = enabled;
        self
    }

    /// Enable or disable white-point normalization
    #[must_use]
    pub fn white_point_adjust(mut self, enabled: bool) -> Self {
        self.config.white_point_adjust = enabled;
        self
    }

    /// Override the kernel resolution
    #[must_use]
    pub fn kernel_resolution(mut self, resolution: Option<u32>) -> Self {
        self.config.kernel_resolution_override = resolution;
        self
    }

    /// Build the config
    #[must_use]
    pub fn build(self) -> CorrectionConfig {
        self.config
    }
}

// ============================================================
// Output options
// ============================================================

/// How the corrected plane is written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputOptions {
    /// Force 8 or 16 bit output; `None` keeps the source depth
    pub output_bits: Option<BitDepth>,

    /// ICC profile file replacing any embedded profile
    pub profile_path: Option<PathBuf>,

    /// Write kernel, reduced image and correction plane next to the output
    pub save_intermediates: bool,
}

// ============================================================
// File config
// ============================================================

/// Settings loaded from a TOML file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub edge_reflectance: Option<f32>,
    pub adobe_rgb: Option<bool>,
    pub white_point_adjust: Option<bool>,
    pub output_bits: Option<u8>,
    pub profile: Option<PathBuf>,
    pub default_dpi: Option<u32>,
}

/// Values given on the command line; `None` defers to the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub edge_reflectance: Option<f32>,
    pub adobe_rgb: Option<bool>,
    pub white_point_adjust: Option<bool>,
    pub output_bits: Option<u8>,
    pub profile: Option<PathBuf>,
    pub simulate: bool,
    pub no_gain_restore: bool,
    pub kernel_resolution: Option<u32>,
    pub save_intermediates: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything one invocation needs, merged and validated
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub correction: CorrectionConfig,
    pub output: OutputOptions,

    /// Exponent applied when decoding inputs
    pub decode_gamma: f32,

    /// Resolution assumed for inputs without resolution metadata
    pub default_dpi: u32,
}

impl Config {
    /// Load from the first config file found, or defaults
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|e| match e {
            ReflFixError::InvalidArgument(msg) => {
                ReflFixError::InvalidArgument(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse TOML text
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ReflFixError::InvalidArgument(e.to_string()))
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("scanner-refl-fix").join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Merge with command-line values and validate the result
    pub fn merge_with_cli(&self, cli: &CliOverrides) -> Result<RunConfig> {
        let edge_reflectance = cli
            .edge_reflectance
            .or(self.edge_reflectance)
            .unwrap_or(DEFAULT_EDGE_REFLECTANCE);
        let adobe_rgb = cli.adobe_rgb.or(self.adobe_rgb).unwrap_or(false);
        let white_point_adjust = cli
            .white_point_adjust
            .or(self.white_point_adjust)
            .unwrap_or(false);

        let output_bits = match cli.output_bits.or(self.output_bits) {
            None | Some(0) => None,
            Some(bits) => Some(BitDepth::from_bits(bits).map_err(|_| {
                ReflFixError::InvalidArgument(format!(
                    "-F n: n must be either 8 or 16, got {}",
                    bits
                ))
            })?),
        };

        let default_dpi = self.default_dpi.unwrap_or(DEFAULT_DPI);
        if default_dpi == 0 {
            return Err(ReflFixError::InvalidArgument(
                "default_dpi must be positive".to_string(),
            ));
        }

        let mode = if cli.simulate {
            CorrectionMode::Simulate
        } else {
            CorrectionMode::Correct
        };

        let correction = CorrectionConfig::builder()
            .edge_reflectance(edge_reflectance)
            .mode(mode)
            .gain_restore(!cli.no_gain_restore)
            .white_point_adjust(white_point_adjust)
            .kernel_resolution(cli.kernel_resolution)
            .build();
        correction.validate()?;

        Ok(RunConfig {
            correction,
            output: OutputOptions {
                output_bits,
                profile_path: cli.profile.clone().or_else(|| self.profile.clone()),
                save_intermediates: cli.save_intermediates,
            },
            decode_gamma: if adobe_rgb { ADOBE_RGB_GAMMA } else { SCANNER_GAMMA },
            default_dpi,
        })
    }
}

// ============================================================
// Tests
// ============================================================
