// src/bin/b3d_post.rs
//! Command line entry point for post-processing records

use anyhow::{Context, Result};
use b3d_post::{BatchOutcome, ConfigLoader, JsonRecordCodec, Pipeline, PointMassLoader, PostProcessConfig};
use clap::{ArgAction, Parser, ValueHint};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Post-process biomechanics records: resample, clean up and recompute", long_about = None)]
struct Cli {
    /// Record file, or a folder searched recursively for records
    #[arg(value_hint = ValueHint::AnyPath)]
    input: PathBuf,

    /// Output file, or the folder mirroring the input tree
    #[arg(value_hint = ValueHint::AnyPath)]
    output: PathBuf,

    /// TOML configuration file; command line flags override it
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Folder holding skeleton geometry (defaults to `Geometry` next to the input)
    #[arg(long, value_hint = ValueHint::DirPath)]
    geometry_folder: Option<PathBuf>,

    /// Reserved: only keep reviewed segments
    #[arg(long, action = ArgAction::SetTrue)]
    only_reviewed: bool,

    /// Drop trials without a dynamics pass and skip records without any
    #[arg(long, action = ArgAction::SetTrue)]
    only_dynamics: bool,

    /// Append a lowpass-filtered pass to every trial
    #[arg(long, action = ArgAction::SetTrue)]
    clean_up_noise: bool,

    /// Recompute torques, residuals and root histories for every pass
    #[arg(long, action = ArgAction::SetTrue)]
    recompute_values: bool,

    /// Number of past root states kept per frame
    #[arg(long)]
    root_history_len: Option<usize>,

    /// Frames between kept root states
    #[arg(long)]
    root_history_stride: Option<usize>,

    /// Resample every trial to this rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut PostProcessConfig) {
        config.only_reviewed |= self.only_reviewed;
        config.only_dynamics |= self.only_dynamics;
        config.clean_up_noise |= self.clean_up_noise;
        config.recompute_values |= self.recompute_values;
        if let Some(len) = self.root_history_len {
            config.root_history_len = len;
        }
        if let Some(stride) = self.root_history_stride {
            config.root_history_stride = stride;
        }
        if let Some(rate) = self.sample_rate {
            config.target_sample_rate_hz = Some(rate);
        }
        if let Some(folder) = &self.geometry_folder {
            config.geometry_folder = Some(folder.clone());
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(&cli) {
        Ok(BatchOutcome::Success) => ExitCode::SUCCESS,
        Ok(BatchOutcome::PartialFailure) => {
            warn!("some records failed");
            ExitCode::from(1)
        }
        Ok(BatchOutcome::TotalFailure) => {
            error!("every record failed");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<BatchOutcome> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_paths(vec![path.clone()]),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("failed to load configuration")?;
    cli.apply_overrides(&mut config);

    let input = std::path::absolute(&cli.input)
        .with_context(|| format!("failed to resolve input path {}", cli.input.display()))?;
    let output = std::path::absolute(&cli.output)
        .with_context(|| format!("failed to resolve output path {}", cli.output.display()))?;
    info!(input = %input.display(), output = %output.display(), "starting post-processing");

    let codec = JsonRecordCodec::new();
    let pipeline = Pipeline::new(config, &codec, &PointMassLoader).context("invalid configuration")?;
    let summary = pipeline
        .run(&input, &output)
        .with_context(|| format!("failed to post-process {}", input.display()))?;

    for (path, reason) in &summary.failed {
        warn!(path = %path.display(), %reason, "failed record");
    }
    Ok(summary.outcome())
}
