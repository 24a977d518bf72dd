//! CLI argument definitions

use clap::Parser;
use std::path::{Path, PathBuf};

use crate::config::CliOverrides;
use crate::error::ReflFixError;

/// Exit codes for the CLI
pub mod exit_codes {
    use crate::error::ReflFixError;

    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGS: i32 = 2;
    pub const INPUT_NOT_FOUND: i32 = 3;

    /// Exit code reported for `err`
    pub fn for_error(err: &ReflFixError) -> i32 {
        match err {
            ReflFixError::InputNotFound(_) => INPUT_NOT_FOUND,
            ReflFixError::InvalidArgument(_) => INVALID_ARGS,
            ReflFixError::GeometryMismatch(_)
            | ReflFixError::UnsupportedFormat(_)
            | ReflFixError::IoError(_) => GENERAL_ERROR,
        }
    }
}

/// Remove re-reflected light from Epson V800/V850 flatbed scans
#[derive(Parser, Debug)]
#[command(name = "scannerreflfix")]
#[command(author, version)]
#[command(override_usage = "scannerreflfix [OPTIONS] <INFILE>... <OUTFILE>")]
#[command(
    about = "Remove re-reflected light from Epson V800/V850 flatbed scans",
    long_about = "Remove re-reflected light from Epson V800/V850 flatbed scans.\n\n\
        Light reflected by the scanned page bounces off the lid and back onto \
        nearby areas, lifting dark regions next to bright ones. This tool \
        estimates that light from the scan itself and removes it.\n\n\
        Several inputs of identical size are averaged before correction. \
        Inputs must be linear scans with no color management applied, \
        optionally converted to Adobe RGB (-A)."
)]
pub struct Cli {
    /// Input files followed by the output file
    #[arg(required = true, num_args = 2.., value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Inputs are Adobe RGB (gamma 2.2) instead of scanner native (gamma 1.7)
    #[arg(short = 'A', long = "adobe-rgb")]
    pub adobe_rgb: bool,

    /// Output bits per sample: 8 or 16 (default keeps the input depth)
    #[arg(short = 'F', long = "bits", value_name = "N")]
    pub output_bits: Option<u8>,

    /// Scale so the brightest 0.01% of samples reach full white
    #[arg(short = 'W', long = "white-point")]
    pub white_point: bool,

    /// ICC profile to embed in the output
    #[arg(short = 'P', long = "profile", value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Reflectance assumed outside the scanned area (0.0-1.0, default 0.85)
    #[arg(short = 'S', long = "edge-reflectance", value_name = "R")]
    pub edge_reflectance: Option<f32>,

    /// Write reflArray.tif, imageorig.tif and refl_light.tif next to the output
    #[arg(short = 'I', long = "intermediates")]
    pub intermediates: bool,

    /// Report per-stage timing
    #[arg(short = 'T', long = "timing")]
    pub timing: bool,

    /// Skip the gain restore after correction
    #[arg(short = 'N', long = "no-gain-restore")]
    pub no_gain_restore: bool,

    /// Add reflected light instead of removing it
    #[arg(short = 'R', long = "simulate")]
    pub simulate: bool,

    /// Only average the inputs; no correction
    #[arg(short = 'Z', long = "average-only")]
    pub average_only: bool,

    /// Synthesize the kernel at this resolution instead of deriving it
    #[arg(long = "kernel-dpi", value_name = "DPI")]
    pub kernel_dpi: Option<u32>,

    /// Config file (default: ./scannerreflfix.toml, then the user config dir)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Files to read
    pub fn inputs(&self) -> &[PathBuf] {
        match self.files.split_last() {
            Some((_, inputs)) => inputs,
            None => &[],
        }
    }

    /// File to write
    pub fn output(&self) -> Result<&Path, ReflFixError> {
        match self.files.as_slice() {
            [_, .., output] => Ok(output.as_path()),
            _ => Err(ReflFixError::InvalidArgument(
                "need at least one input and one output file".to_string(),
            )),
        }
    }

    /// Values that take precedence over the config file
    ///
    /// Switches only override when given; an absent switch defers to the
    /// file rather than forcing `false`.
    pub fn to_overrides(&self) -> CliOverrides {
        let mut overrides = CliOverrides::new();
        overrides.edge_reflectance = self.edge_reflectance;
        if self.adobe_rgb {
            overrides.adobe_rgb = Some(true);
        }
        if self.white_point {
            overrides.white_point_adjust = Some(true);
        }
        overrides.output_bits = self.output_bits;
        overrides.profile = self.profile.clone();
        overrides.simulate = self.simulate;
        overrides.no_gain_restore = self.no_gain_restore;
        overrides.kernel_resolution = self.kernel_dpi;
        overrides.save_intermediates = self.intermediates;
        overrides
    }
}
