use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;
use crate::pacing::PacingConfig;
use crate::scorer::ScorerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Input and output file locations
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Entity list (`{"restaurants": [...]}`)
    #[serde(default = "default_input_path")]
    pub input: PathBuf,
    /// Checkpoint file
    #[serde(default = "default_progress_path")]
    pub progress: PathBuf,
    /// Result artifact
    #[serde(default = "default_output_path")]
    pub output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input_path(),
            progress: default_progress_path(),
            output: default_output_path(),
        }
    }
}

fn default_input_path() -> PathBuf {
    PathBuf::from("data/restaurants.json")
}

fn default_progress_path() -> PathBuf {
    PathBuf::from("data/scrape_progress_parallel.json")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data/google_maps_raw.json")
}

/// HTTP lookup service configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtractorConfig {
    /// Lookup endpoint (e.g., "http://127.0.0.1:8900/lookup")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Query string parameter carrying the search text
    #[serde(default = "default_query_param")]
    pub query_param: String,
    /// Appended to every search query
    #[serde(default = "default_query_suffix")]
    pub query_suffix: String,
    /// Transport-level timeout for one request (seconds).
    /// The per-task extraction timeout from `[pacing]` is normally shorter.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            query_param: default_query_param(),
            query_suffix: default_query_suffix(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8900/lookup".to_string()
}

fn default_query_param() -> String {
    "q".to_string()
}

fn default_query_suffix() -> String {
    "NYC".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("placematch/", env!("CARGO_PKG_VERSION")).to_string()
}
