//! scannerreflfix - Re-reflected light correction for flatbed scans
//!
//! CLI entry point

use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scanner_refl_fix::{
    average_planes, exit_codes, io, BitDepth, Cli, Config, CorrectionMode, Intermediates,
    PixelPlane, ProgressCallback, ReflFixError, ReflectionPipeline, Result, RunConfig,
    INTERMEDIATE_GAMMA,
};

/// Intermediate file names, written next to the output
const KERNEL_FILE: &str = "reflArray.tif";
const REDUCED_FILE: &str = "imageorig.tif";
const CORRECTION_FILE: &str = "refl_light.tif";

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    std::process::exit(match run(&cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::for_error(&e)
        }
    });
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ============ Progress Callback Implementation ============

/// Per-stage progress printed for -T
struct VerboseProgress {
    timing: bool,
    verbose_level: u8,
}

impl VerboseProgress {
    fn new(timing: bool, verbose_level: u8) -> Self {
        Self {
            timing,
            verbose_level,
        }
    }
}

impl ProgressCallback for VerboseProgress {
    fn on_step_start(&self, step: &str) {
        if self.verbose_level > 0 {
            println!("  {}", step);
        }
    }

    fn on_step_complete(&self, step: &str, message: &str) {
        if self.timing || self.verbose_level > 0 {
            println!("    {}: {}", step, message);
        }
    }

    fn on_debug(&self, message: &str) {
        if self.verbose_level > 1 {
            println!("    [DEBUG] {}", message);
        }
    }
}

// ============ Run ============

fn run(cli: &Cli) -> Result<()> {
    let start_time = Instant::now();

    let file_config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let run_config = file_config.merge_with_cli(&cli.to_overrides())?;

    let inputs = cli.inputs();
    let output = cli.output()?;
    for input in inputs {
        if !input.exists() {
            return Err(ReflFixError::InputNotFound(input.clone()));
        }
    }

    // Read the profile before the slow part so a bad path fails fast
    let profile = match &run_config.output.profile_path {
        Some(path) => Some(io::read_profile(path)?),
        None => None,
    };

    if cli.average_only {
        println!("No File Processing");
    } else {
        match run_config.correction.mode {
            CorrectionMode::Simulate => println!("Simulating reflected light for V800/V850"),
            CorrectionMode::Correct => println!("Correcting reflected light for V800/V850"),
        }
    }

    let mut image = load_inputs(inputs, &run_config, cli.average_only, output)?;
    let source_depth = image.bit_depth;

    if !cli.average_only {
        let pipeline = ReflectionPipeline::new(run_config.correction.clone())?
            .with_intermediates(run_config.output.save_intermediates);
        let progress = VerboseProgress::new(cli.timing, cli.verbose);
        let result = pipeline.process_with_progress(image, &progress)?;

        if let Some(intermediates) = &result.intermediates {
            write_intermediates(intermediates, output)?;
        }
        if let Some(scale) = result.white_point_scale {
            info!(scale, "white point adjusted");
        }
        image = result.image;
    }

    if profile.is_some() {
        image.profile = profile;
    }
    let depth = run_config.output.output_bits.unwrap_or(source_depth);
    io::write_image(output, &image, depth)?;

    if cli.timing {
        println!("Total time: {:.2}s", start_time.elapsed().as_secs_f64());
    }
    Ok(())
}

/// Decode every input and average them into one plane
fn load_inputs(
    inputs: &[PathBuf],
    run_config: &RunConfig,
    average_only: bool,
    output: &Path,
) -> Result<PixelPlane> {
    if average_only && inputs.len() > 1 {
        println!("Averaging {} files into {}", inputs.len(), output.display());
    }

    let planes = inputs
        .iter()
        .map(|path| io::read_image(path, run_config.decode_gamma, run_config.default_dpi))
        .collect::<Result<Vec<_>>>()?;
    average_planes(planes)
}

/// Write the diagnostic planes beside `output`, 16 bit at gamma 2.2
fn write_intermediates(intermediates: &Intermediates, output: &Path) -> Result<()> {
    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    let files = [
        (
            KERNEL_FILE,
            &intermediates.kernel,
            "image of additional reflected light",
        ),
        (
            REDUCED_FILE,
            &intermediates.reduced,
            "reduced original file with surround",
        ),
        (
            CORRECTION_FILE,
            &intermediates.correction,
            "image of estimated reflected light",
        ),
    ];

    for (name, plane, description) in files {
        let path = dir.join(name);
        println!("Saving {}, {} in gamma = 2.2", path.display(), description);
        let mut plane = plane.clone();
        plane.gamma = INTERMEDIATE_GAMMA;
        plane.profile = None;
        io::write_image(&path, &plane, BitDepth::Sixteen)?;
    }
    Ok(())
}
