//! Extraction worker.
//!
//! Each worker owns one extraction session and loops:
//! take a task, fetch under a timeout, score, record, pace.
//! Transient failures become failed outcomes. A lost session ends the
//! worker and leaves its claimed task unrecorded for the next resume.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, trace, warn};

use crate::entity::{Entity, Task};
use crate::extractor::{ExtractError, Extractor};
use crate::metrics;
use crate::outcome::ExtractionOutcome;
use crate::pacing::{Pacer, PacingSettings, SharedRateLimiter};
use crate::progress::{ProgressError, ProgressStore};
use crate::queue::TaskQueue;
use crate::reporter::ProgressReporter;
use crate::scorer::ConfidenceScorer;

use super::types::{WorkerExit, WorkerState, WorkerSummary};

/// Build the lookup query for an entity: `"<name>" <address> <region> <suffix>`.
///
/// Whitespace inside the name is collapsed; empty parts are skipped.
pub fn build_query(entity: &Entity, suffix: &str) -> String {
    let name = entity.name.split_whitespace().collect::<Vec<_>>().join(" ");
    let quoted = format!("\"{}\"", name);
    [
        quoted.as_str(),
        entity.address.trim(),
        entity.region.trim(),
        suffix.trim(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Resolve once the stop flag is set.
pub(crate) async fn wait_for_stop(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            // Sender gone without a stop; nothing will ever stop us.
            std::future::pending::<()>().await;
        }
    }
}

/// Shared handles every worker of a run needs.
pub(crate) struct WorkerContext {
    pub queue: Arc<TaskQueue>,
    pub store: Arc<ProgressStore>,
    pub reporter: Arc<ProgressReporter>,
    pub limiter: Arc<SharedRateLimiter>,
    pub scorer: ConfidenceScorer,
    pub pacing: PacingSettings,
    pub query_suffix: String,
    /// Tasks recorded during this run, across workers.
    pub processed: AtomicUsize,
    /// Request a checkpoint after this many recorded tasks (0 = never).
    pub checkpoint_every: usize,
    pub checkpoint_notify: Arc<Notify>,
}

/// Result of one fetch/score attempt.
enum Attempt {
    Outcome(ExtractionOutcome),
    SessionLost(String),
    /// Stop arrived before the request was made.
    Stopped,
}

pub(crate) struct Worker {
    id: usize,
    session: Box<dyn Extractor>,
    ctx: Arc<WorkerContext>,
    pacer: Pacer,
    shutdown: watch::Receiver<bool>,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        id: usize,
        session: Box<dyn Extractor>,
        ctx: Arc<WorkerContext>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let pacer = Pacer::from_settings(&ctx.pacing);
        Self {
            id,
            session,
            ctx,
            pacer,
            shutdown,
            state: WorkerState::Idle,
        }
    }

    pub async fn run(mut self) -> WorkerSummary {
        metrics::WORKERS_ACTIVE.inc();
        debug!(worker = self.id, session = self.session.name(), "Worker started");

        let mut processed = 0;
        let exit = loop {
            self.transition(WorkerState::Idle);
            if *self.shutdown.borrow() {
                break WorkerExit::Stopped;
            }
            let Some(task) = self.ctx.queue.try_take() else {
                self.transition(WorkerState::Draining);
                break WorkerExit::Drained;
            };

            let started = Instant::now();
            let outcome = match self.attempt(&task).await {
                Attempt::Outcome(outcome) => outcome,
                Attempt::SessionLost(reason) => {
                    warn!(
                        worker = self.id,
                        key = task.key(),
                        "Session lost, leaving task for a later run: {}",
                        reason
                    );
                    metrics::SESSIONS_LOST.inc();
                    break WorkerExit::SessionLost(reason);
                }
                Attempt::Stopped => {
                    self.ctx.queue.requeue(task);
                    break WorkerExit::Stopped;
                }
            };

            self.transition(WorkerState::Recording);
            if let Err(e) = self.record(outcome, started.elapsed()).await {
                error!(worker = self.id, key = task.key(), "Failed to record outcome: {}", e);
                break WorkerExit::RecordFailed(e.to_string());
            }
            processed += 1;

            let delay = self.pacer.next_delay();
            if self.pacer.at_batch_boundary() {
                info!(
                    worker = self.id,
                    "Batch done, pausing for {}s",
                    delay.as_secs()
                );
            }
            self.pace(delay).await;
        };

        self.session.close().await;
        metrics::WORKERS_ACTIVE.dec();
        debug!(worker = self.id, processed, ?exit, "Worker finished");

        WorkerSummary {
            worker_id: self.id,
            processed,
            exit,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        trace!(worker = self.id, from = ?self.state, to = ?next, "Worker state");
        self.state = next;
    }

    /// Fetch and score one task. Never records anything.
    async fn attempt(&mut self, task: &Task) -> Attempt {
        let entity = task.entity();
        let query = build_query(entity, &self.ctx.query_suffix);

        self.transition(WorkerState::Fetching);
        tokio::select! {
            _ = self.ctx.limiter.acquire() => {}
            _ = wait_for_stop(&mut self.shutdown) => return Attempt::Stopped,
        }

        let started = Instant::now();
        let fetch = AssertUnwindSafe(tokio::time::timeout(
            self.ctx.pacing.extract_timeout,
            self.session.extract(&query),
        ))
        .catch_unwind()
        .await;
        metrics::EXTRACT_DURATION.observe(started.elapsed().as_secs_f64());

        let result = match fetch {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(ExtractError::Timeout),
            Err(panic) => return Attempt::Outcome(self.panicked(entity, &query, panic)),
        };

        let place = match result {
            Ok(place) if place.is_found() => place,
            Ok(_) => return Attempt::Outcome(self.failed(entity, &query, ExtractError::NotFound)),
            Err(e) if e.is_session_fatal() => return Attempt::SessionLost(e.to_string()),
            Err(e) => return Attempt::Outcome(self.failed(entity, &query, e)),
        };

        self.transition(WorkerState::Scoring);
        let scorer = self.ctx.scorer;
        let scored = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let extracted_name = place.name.as_deref().unwrap_or_default();
            scorer.score(
                &entity.name,
                &entity.address,
                extracted_name,
                place.address.as_deref(),
            )
        }));
        let verdict = match scored {
            Ok(verdict) => verdict,
            Err(panic) => return Attempt::Outcome(self.panicked(entity, &query, panic)),
        };

        metrics::TASKS_TOTAL.with_label_values(&["found"]).inc();
        metrics::NAME_SIMILARITY.observe(verdict.name_similarity);
        if verdict.confident {
            metrics::CONFIDENT_MATCHES.inc();
        }

        let mut outcome = ExtractionOutcome::found(entity, &query, place);
        outcome.verdict = Some(verdict);
        Attempt::Outcome(outcome)
    }

    fn failed(&self, entity: &Entity, query: &str, err: ExtractError) -> ExtractionOutcome {
        let label = match err {
            ExtractError::NotFound => "not_found",
            ExtractError::Timeout => "timeout",
            _ => "error",
        };
        metrics::TASKS_TOTAL.with_label_values(&[label]).inc();
        debug!(worker = self.id, name = %entity.name, "Extraction failed: {}", err);
        ExtractionOutcome::failed(entity, query, err.to_string())
    }

    fn panicked(
        &self,
        entity: &Entity,
        query: &str,
        panic: Box<dyn Any + Send>,
    ) -> ExtractionOutcome {
        let message = panic_message(panic.as_ref());
        metrics::TASKS_TOTAL.with_label_values(&["panic"]).inc();
        warn!(worker = self.id, name = %entity.name, "Task panicked: {}", message);
        ExtractionOutcome::failed(entity, query, format!("panic: {}", message))
    }

    async fn record(&self, outcome: ExtractionOutcome, duration: Duration) -> Result<(), ProgressError> {
        let found = outcome.found;
        let key = outcome.key();
        let similarity = outcome.verdict.as_ref().map(|v| v.name_similarity);

        self.ctx.store.record(outcome).await?;
        self.ctx.reporter.record(found, duration);
        debug!(
            worker = self.id,
            key = %key,
            found,
            name_similarity = similarity,
            elapsed_ms = duration.as_millis() as u64,
            "Task recorded"
        );

        let recorded = self.ctx.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if self.ctx.checkpoint_every > 0 && recorded % self.ctx.checkpoint_every == 0 {
            self.ctx.checkpoint_notify.notify_one();
        }
        Ok(())
    }

    /// Sleep for `delay`, cut short by the stop signal.
    async fn pace(&mut self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = wait_for_stop(&mut self.shutdown) => {}
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
