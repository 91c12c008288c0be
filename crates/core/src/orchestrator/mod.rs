//! Extraction orchestrator for concurrent, checkpointed runs.
//!
//! The orchestrator drives a pool of workers over a shared queue:
//! - **Workers**: one session each, sequential within a worker
//! - **Checkpoints**: periodic and count-triggered, plus a final one
//! - **Status**: periodic throughput/ETA lines from the reporter

mod config;
mod runner;
mod types;
mod worker;

pub use config::{OrchestratorConfig, RunProfile, RunSettings};
pub use runner::{ExtractionOrchestrator, ShutdownHandle};
pub use types::{
    OrchestratorError, RunReport, RunStatus, WorkerExit, WorkerState, WorkerSummary,
};
pub use worker::build_query;
