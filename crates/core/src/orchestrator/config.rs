//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{validate_config, Config, ConfigError};
use crate::pacing::PacingSettings;
use crate::queue::QueuePlan;
use crate::scorer::{ConfidenceRule, ConfidenceScorer};

/// Named set of defaults for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunProfile {
    /// Several workers, short delays, strict two-branch confidence rule.
    #[default]
    Parallel,
    /// One worker, long delays with batch pauses, lenient name-only rule.
    SingleStream,
}

impl RunProfile {
    pub fn workers(self) -> usize {
        match self {
            RunProfile::Parallel => 5,
            RunProfile::SingleStream => 1,
        }
    }

    pub fn pacing(self) -> PacingSettings {
        match self {
            RunProfile::Parallel => PacingSettings {
                min_delay: Duration::from_millis(1500),
                max_delay: Duration::from_millis(2500),
                batch_size: 0,
                batch_pause: Duration::from_secs(60),
                requests_per_minute: 0,
                extract_timeout: Duration::from_secs(15),
            },
            RunProfile::SingleStream => PacingSettings {
                min_delay: Duration::from_secs(3),
                max_delay: Duration::from_secs(6),
                batch_size: 50,
                batch_pause: Duration::from_secs(60),
                requests_per_minute: 0,
                extract_timeout: Duration::from_secs(30),
            },
        }
    }

    pub fn rule(self) -> ConfidenceRule {
        match self {
            RunProfile::Parallel => ConfidenceRule::parallel(),
            RunProfile::SingleStream => ConfidenceRule::single_stream(),
        }
    }

    /// Count-based checkpoint cadence (0 = time-based only).
    pub fn checkpoint_every_tasks(self) -> usize {
        match self {
            RunProfile::Parallel => 0,
            RunProfile::SingleStream => 10,
        }
    }
}

impl std::str::FromStr for RunProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "parallel" => Ok(RunProfile::Parallel),
            "single_stream" => Ok(RunProfile::SingleStream),
            other => Err(format!("unknown profile: {}", other)),
        }
    }
}

/// Configuration for the extraction orchestrator (`[orchestrator]` section).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Profile supplying defaults for unset values.
    #[serde(default)]
    pub profile: RunProfile,

    /// Number of concurrent workers, each with its own session.
    #[serde(default)]
    pub workers: Option<usize>,

    /// How often the progress checkpoint is written (seconds).
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval_secs: u64,

    /// Also checkpoint after this many recorded tasks (0 = disabled).
    #[serde(default)]
    pub checkpoint_every_tasks: Option<usize>,

    /// How often a status line is logged (seconds).
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,

    /// Process entities with low-information categories first.
    #[serde(default = "default_prioritize")]
    pub prioritize_unspecified: bool,

    /// Category substrings treated as low-information.
    #[serde(default = "default_priority_markers")]
    pub priority_markers: Vec<String>,

    /// Process at most this many entities per run.
    #[serde(default)]
    pub sample_size: Option<usize>,
}

fn default_checkpoint_interval() -> u64 {
    30
}

fn default_status_interval() -> u64 {
    10
}

fn default_prioritize() -> bool {
    true
}

fn default_priority_markers() -> Vec<String> {
    vec!["Unspecified".to_string()]
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            profile: RunProfile::default(),
            workers: None,
            checkpoint_interval_secs: default_checkpoint_interval(),
            checkpoint_every_tasks: None,
            status_interval_secs: default_status_interval(),
            prioritize_unspecified: default_prioritize(),
            priority_markers: default_priority_markers(),
            sample_size: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| self.profile.workers())
    }

    pub fn resolved_checkpoint_every_tasks(&self) -> usize {
        self.checkpoint_every_tasks
            .unwrap_or_else(|| self.profile.checkpoint_every_tasks())
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub workers: usize,
    pub checkpoint_interval: Duration,
    pub checkpoint_every_tasks: usize,
    pub status_interval: Duration,
    pub pacing: PacingSettings,
    pub plan: QueuePlan,
    pub scorer: ConfidenceScorer,
    /// Appended to every search query.
    pub query_suffix: String,
}

impl RunSettings {
    /// Validate `config` and resolve profile defaults.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        validate_config(config)?;

        let orchestrator = &config.orchestrator;
        let profile = orchestrator.profile;
        let scorer = config
            .scorer
            .build(profile.rule())
            .map_err(ConfigError::ValidationError)?;

        Ok(Self {
            workers: orchestrator.resolved_workers(),
            checkpoint_interval: Duration::from_secs(orchestrator.checkpoint_interval_secs),
            checkpoint_every_tasks: orchestrator.resolved_checkpoint_every_tasks(),
            status_interval: Duration::from_secs(orchestrator.status_interval_secs),
            pacing: config.pacing.resolve(&profile.pacing()),
            plan: QueuePlan {
                prioritize: orchestrator.prioritize_unspecified,
                priority_markers: orchestrator.priority_markers.clone(),
                sample_size: orchestrator.sample_size,
            },
            scorer,
            query_suffix: config.extractor.query_suffix.clone(),
        })
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        let profile = RunProfile::default();
        Self {
            workers: profile.workers(),
            checkpoint_interval: Duration::from_secs(default_checkpoint_interval()),
            checkpoint_every_tasks: profile.checkpoint_every_tasks(),
            status_interval: Duration::from_secs(default_status_interval()),
            pacing: profile.pacing(),
            plan: QueuePlan::default(),
            scorer: ConfidenceScorer::default(),
            query_suffix: "NYC".to_string(),
        }
    }
}
