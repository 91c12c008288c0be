//! Command-line arguments and how they override the loaded configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use placematch_core::{Config, RunProfile, StartMode};

/// Entities processed when neither `--sample` nor `--all` is given.
pub const DEFAULT_SAMPLE: usize = 100;

/// placematch - match restaurant records against a place lookup service.
#[derive(Debug, Parser)]
#[command(name = "placematch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PLACEMATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Entity list to process
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Checkpoint file
    #[arg(long)]
    pub progress: Option<PathBuf>,

    /// Result artifact
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Process at most N entities
    #[arg(long, value_name = "N", conflicts_with = "all")]
    pub sample: Option<usize>,

    /// Process every remaining entity
    #[arg(long)]
    pub all: bool,

    /// Continue from the existing checkpoint
    #[arg(long)]
    pub resume: bool,

    /// With --resume, start fresh if the checkpoint is missing or corrupt
    #[arg(long, requires = "resume")]
    pub fresh_on_corrupt: bool,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Keep input order instead of moving unspecified categories first
    #[arg(long)]
    pub no_prioritize: bool,

    /// Run profile supplying pacing and confidence defaults
    #[arg(short, long, value_enum)]
    pub profile: Option<CliProfile>,

    /// Lookup service endpoint
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long, value_name = "FILE")]
    pub metrics_out: Option<PathBuf>,
}

/// Run profiles selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliProfile {
    /// Several workers, short delays
    Parallel,
    /// One worker, long delays with batch pauses
    SingleStream,
}

impl From<CliProfile> for RunProfile {
    fn from(profile: CliProfile) -> Self {
        match profile {
            CliProfile::Parallel => RunProfile::Parallel,
            CliProfile::SingleStream => RunProfile::SingleStream,
        }
    }
}

impl Cli {
    /// Apply command-line overrides on top of file and environment config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.paths.input = input.clone();
        }
        if let Some(progress) = &self.progress {
            config.paths.progress = progress.clone();
        }
        if let Some(output) = &self.output {
            config.paths.output = output.clone();
        }
        if let Some(profile) = self.profile {
            config.orchestrator.profile = profile.into();
        }
        if let Some(workers) = self.workers {
            config.orchestrator.workers = Some(workers);
        }
        if self.no_prioritize {
            config.orchestrator.prioritize_unspecified = false;
        }
        if let Some(base_url) = &self.base_url {
            config.extractor.base_url = base_url.clone();
        }

        config.orchestrator.sample_size = if self.all {
            None
        } else if let Some(sample) = self.sample {
            Some(sample)
        } else {
            config.orchestrator.sample_size.or(Some(DEFAULT_SAMPLE))
        };
    }

    pub fn start_mode(&self) -> StartMode {
        if self.resume {
            StartMode::Resume {
                fresh_on_corrupt: self.fresh_on_corrupt,
            }
        } else {
            StartMode::Fresh
        }
    }
}
