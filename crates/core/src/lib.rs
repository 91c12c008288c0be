pub mod config;
pub mod entity;
pub mod extractor;
pub mod metrics;
pub mod orchestrator;
pub mod outcome;
pub mod pacing;
pub mod progress;
pub mod queue;
pub mod reporter;
pub mod scorer;
pub mod testing;
mod timestamp;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, ExtractorConfig, PathsConfig,
};
pub use entity::{fingerprint, load_entities, Entity, EntityError, Task};
pub use extractor::{
    ExtractError, Extractor, ExtractorFactory, HttpExtractor, HttpExtractorFactory, RawPlace,
};
pub use orchestrator::{
    ExtractionOrchestrator, OrchestratorConfig, OrchestratorError, RunProfile, RunReport,
    RunSettings, RunStatus, ShutdownHandle,
};
pub use outcome::{ExtractionOutcome, MatchVerdict};
pub use progress::{ProgressCounts, ProgressError, ProgressState, ProgressStore, ResultArtifact, StartMode};
pub use queue::{QueuePlan, QueueStats, TaskQueue};
pub use reporter::{format_eta, ProgressReporter, ReporterSnapshot};
pub use scorer::{ConfidenceRule, ConfidenceScorer, ScorerConfig, SimilarityMetric};
