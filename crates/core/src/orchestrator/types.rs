//! Types for the extraction orchestrator.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extractor::ExtractError;
use crate::progress::{ProgressCounts, ProgressError};
use crate::queue::QueueStats;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A run is already in progress on this orchestrator.
    #[error("orchestrator is already running")]
    AlreadyRunning,

    /// The progress store was sealed by an earlier run.
    #[error("progress store is sealed; open a new store to run again")]
    StoreSealed,

    /// A worker session could not be opened.
    #[error("failed to open session for worker {worker_id}: {source}")]
    SessionOpen {
        worker_id: usize,
        #[source]
        source: ExtractError,
    },

    /// The final checkpoint could not be written.
    #[error("final checkpoint failed: {0}")]
    FinalCheckpoint(#[source] ProgressError),

    /// The result artifact could not be written.
    #[error("failed to write results: {0}")]
    Results(#[source] ProgressError),
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every queued task was recorded.
    Completed,
    /// A stop was requested before the queue drained.
    Stopped,
    /// Workers exited with tasks left unrecorded (lost sessions).
    Incomplete,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "stopped",
            RunStatus::Incomplete => "incomplete",
        };
        f.write_str(s)
    }
}

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Fetching,
    Scoring,
    Recording,
    Draining,
}

/// Why a worker stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The queue was empty.
    Drained,
    /// The stop signal was observed.
    Stopped,
    /// The session died; the claimed task was left unrecorded.
    SessionLost(String),
    /// The outcome could not be recorded; the claimed task stays unrecorded.
    RecordFailed(String),
}

impl WorkerExit {
    /// Whether the worker left a claimed task unrecorded.
    pub fn abandoned_task(&self) -> bool {
        matches!(self, WorkerExit::SessionLost(_) | WorkerExit::RecordFailed(_))
    }
}

/// What one worker did during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub processed: usize,
    pub exit: WorkerExit,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    /// Queue construction counts.
    pub queue: QueueStats,
    /// Tasks recorded during this run.
    pub processed: usize,
    pub found: usize,
    pub failed: usize,
    /// Found places judged a confident match during this run.
    pub confident: usize,
    /// Tasks claimed by a worker that exited without recording them.
    pub abandoned: usize,
    /// Tasks never claimed.
    pub remaining: usize,
    pub workers: Vec<WorkerSummary>,
    pub elapsed: Duration,
    /// Totals in the progress store, including earlier runs.
    pub totals: ProgressCounts,
    /// Number of results in the written artifact, if one was written.
    pub results_written: Option<usize>,
}

impl RunReport {
    /// Tasks per minute over the whole run.
    pub fn average_rate_per_min(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.processed as f64 / secs * 60.0
    }

    /// Found / processed during this run, as a percentage.
    pub fn match_rate(&self) -> f64 {
        self.found as f64 / self.processed.max(1) as f64 * 100.0
    }
}
