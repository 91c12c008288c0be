//! Extraction orchestrator implementation.
//!
//! Runs one extraction pass over an entity list:
//! - Builds the queue from the entities not yet in the progress store
//! - Opens one session per worker (any failure aborts before work starts)
//! - Runs the workers alongside a checkpoint loop and a status loop
//! - Writes the final checkpoint, then the result artifact

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Notify};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entity::Entity;
use crate::extractor::{Extractor, ExtractorFactory};
use crate::metrics;
use crate::pacing::SharedRateLimiter;
use crate::progress::ProgressStore;
use crate::queue::TaskQueue;
use crate::reporter::ProgressReporter;

use super::config::RunSettings;
use super::types::{OrchestratorError, RunReport, RunStatus, WorkerSummary};
use super::worker::{wait_for_stop, Worker, WorkerContext};

/// Handle for requesting a graceful stop from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Ask workers to finish their current task and exit.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// The extraction orchestrator - drives a run from queue to result artifact.
pub struct ExtractionOrchestrator {
    settings: RunSettings,
    store: Arc<ProgressStore>,
    factory: Arc<dyn ExtractorFactory>,
    results_path: Option<PathBuf>,

    // Runtime state
    running: AtomicBool,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for ExtractionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionOrchestrator")
            .field("settings", &self.settings)
            .field("store", &self.store.path())
            .field("factory", &"<factory>")
            .field("results_path", &self.results_path)
            .finish()
    }
}

impl ExtractionOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        settings: RunSettings,
        store: Arc<ProgressStore>,
        factory: Arc<dyn ExtractorFactory>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            settings,
            store,
            factory,
            results_path: None,
            running: AtomicBool::new(false),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Write the result artifact here at the end of an unstopped run.
    pub fn with_results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_path = Some(path.into());
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Request a graceful stop.
    pub fn stop(&self) {
        info!("Stop requested, letting workers finish their current task");
        self.shutdown_tx.send_replace(true);
    }

    /// Run one extraction pass over `entities`.
    pub async fn run(&self, entities: &[Entity]) -> Result<RunReport, OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(OrchestratorError::AlreadyRunning);
        }
        let result = self.run_inner(entities).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, entities: &[Entity]) -> Result<RunReport, OrchestratorError> {
        if self.store.is_sealed() {
            return Err(OrchestratorError::StoreSealed);
        }
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        self.store
            .set_run_id(run_id.clone())
            .await
            .map_err(|_| OrchestratorError::StoreSealed)?;

        let completed = self.store.completed_keys().await;
        let (queue, queue_stats) = TaskQueue::build(entities, &completed, &self.settings.plan);
        let queue = Arc::new(queue);
        info!(
            run_id = %run_id,
            "Queued {} of {} entities ({} already done, {} duplicates, {} prioritized)",
            queue_stats.queued,
            queue_stats.input,
            queue_stats.already_completed,
            queue_stats.duplicates,
            queue_stats.prioritized
        );

        let worker_count = self.settings.workers.min(queue_stats.queued);
        let sessions = self.open_sessions(worker_count).await?;

        let reporter = Arc::new(ProgressReporter::new(queue_stats.queued));
        let checkpoint_notify = Arc::new(Notify::new());
        let ctx = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            store: Arc::clone(&self.store),
            reporter: Arc::clone(&reporter),
            limiter: Arc::new(SharedRateLimiter::new(self.settings.pacing.requests_per_minute)),
            scorer: self.settings.scorer,
            pacing: self.settings.pacing,
            query_suffix: self.settings.query_suffix.clone(),
            processed: AtomicUsize::new(0),
            checkpoint_every: self.settings.checkpoint_every_tasks,
            checkpoint_notify: Arc::clone(&checkpoint_notify),
        });

        if worker_count > 0 {
            info!(
                "Starting {} workers ({:?}-{:?} delay, {:?} timeout)",
                worker_count,
                self.settings.pacing.min_delay,
                self.settings.pacing.max_delay,
                self.settings.pacing.extract_timeout
            );
        }

        let handles: Vec<JoinHandle<WorkerSummary>> = sessions
            .into_iter()
            .enumerate()
            .map(|(id, session)| {
                let worker = Worker::new(
                    id,
                    session,
                    Arc::clone(&ctx),
                    self.shutdown_tx.subscribe(),
                );
                tokio::spawn(worker.run())
            })
            .collect();

        let (loops_tx, loops_rx) = watch::channel(false);
        let checkpoint_loop = self.spawn_checkpoint_loop(checkpoint_notify, loops_rx.clone());
        let status_loop = self.spawn_status_loop(Arc::clone(&reporter), loops_rx);

        // Spawned tasks must not outlive a cancelled run.
        let mut abort_handles: Vec<AbortHandle> =
            handles.iter().map(JoinHandle::abort_handle).collect();
        abort_handles.push(checkpoint_loop.abort_handle());
        abort_handles.push(status_loop.abort_handle());
        let _tasks = AbortOnDrop(abort_handles);

        let mut workers = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(summary) => workers.push(summary),
                Err(e) => error!("Worker task failed: {}", e),
            }
        }

        loops_tx.send_replace(true);
        for handle in [checkpoint_loop, status_loop] {
            if let Err(e) = handle.await {
                warn!("Background loop failed: {}", e);
            }
        }

        match self.store.seal().await {
            Ok(_) => {
                metrics::CHECKPOINTS_TOTAL.with_label_values(&["ok"]).inc();
            }
            Err(e) => {
                metrics::CHECKPOINTS_TOTAL.with_label_values(&["failed"]).inc();
                error!("Final checkpoint failed: {}", e);
                return Err(OrchestratorError::FinalCheckpoint(e));
            }
        }

        let stopped = *self.shutdown_tx.borrow();
        let abandoned = workers
            .iter()
            .filter(|w| w.exit.abandoned_task())
            .count();
        let remaining = queue.remaining();
        let status = if stopped && (remaining > 0 || abandoned > 0) {
            RunStatus::Stopped
        } else if remaining > 0 || abandoned > 0 {
            RunStatus::Incomplete
        } else {
            RunStatus::Completed
        };

        let results_written = match (&self.results_path, status == RunStatus::Stopped) {
            (Some(path), false) => {
                let artifact = self
                    .store
                    .write_results(path)
                    .await
                    .map_err(OrchestratorError::Results)?;
                Some(artifact.count)
            }
            (Some(_), true) => {
                info!("Run was stopped; skipping result artifact");
                None
            }
            (None, _) => None,
        };

        let snapshot = reporter.snapshot();
        let totals = self.store.counts().await;
        let confident_this_run = {
            let state = self.store.snapshot().await;
            state
                .successes()
                .iter()
                .filter(|o| o.is_confident())
                .filter(|o| !completed.contains(&o.key()))
                .count()
        };

        let report = RunReport {
            run_id,
            status,
            queue: queue_stats,
            processed: snapshot.completed,
            found: snapshot.found,
            failed: snapshot.failed,
            confident: confident_this_run,
            abandoned,
            remaining,
            workers,
            elapsed: started.elapsed(),
            totals,
            results_written,
        };

        info!(
            "Run {} {}: {} processed ({} found, {} failed), {} abandoned, {} remaining",
            report.run_id,
            report.status,
            report.processed,
            report.found,
            report.failed,
            report.abandoned,
            report.remaining
        );

        Ok(report)
    }

    /// Open one session per worker, closing the opened ones on failure.
    async fn open_sessions(
        &self,
        count: usize,
    ) -> Result<Vec<Box<dyn Extractor>>, OrchestratorError> {
        let mut sessions = Vec::with_capacity(count);
        for worker_id in 0..count {
            match self.factory.open_session(worker_id).await {
                Ok(session) => {
                    debug!(worker = worker_id, session = session.name(), "Session opened");
                    sessions.push(session);
                }
                Err(source) => {
                    error!(worker = worker_id, "Failed to open session: {}", source);
                    for session in &sessions {
                        session.close().await;
                    }
                    return Err(OrchestratorError::SessionOpen { worker_id, source });
                }
            }
        }
        Ok(sessions)
    }

    /// Spawn the periodic (and count-triggered) checkpoint loop.
    fn spawn_checkpoint_loop(
        &self,
        notify: Arc<Notify>,
        mut stop_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let interval = self.settings.checkpoint_interval;

        tokio::spawn(async move {
            debug!("Checkpoint loop started");
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = wait_for_stop(&mut stop_rx) => break,
                    _ = ticker.tick() => write_checkpoint(&store, "periodic").await,
                    _ = notify.notified() => write_checkpoint(&store, "task count").await,
                }
            }
            debug!("Checkpoint loop stopped");
        })
    }

    /// Spawn the status loop logging reporter snapshots.
    fn spawn_status_loop(
        &self,
        reporter: Arc<ProgressReporter>,
        mut stop_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let interval = self.settings.status_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = wait_for_stop(&mut stop_rx) => break,
                    _ = ticker.tick() => {
                        let snap = reporter.snapshot();
                        let totals = store.counts().await;
                        info!(
                            "Progress: {}/{} ({:.1}%) | found {} | failed {} | {:.1}/min | ETA {} | total done {}",
                            snap.completed,
                            snap.total,
                            snap.percent(),
                            snap.found,
                            snap.failed,
                            snap.rate_per_min,
                            snap.eta_display(),
                            totals.completed
                        );
                    }
                }
            }
        })
    }
}

/// Aborts the wrapped tasks when dropped. Finished tasks are unaffected.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

async fn write_checkpoint(store: &ProgressStore, reason: &str) {
    match store.checkpoint().await {
        Ok(_) => {
            metrics::CHECKPOINTS_TOTAL.with_label_values(&["ok"]).inc();
            debug!(reason, "Checkpoint saved");
        }
        Err(e) => {
            metrics::CHECKPOINTS_TOTAL.with_label_values(&["failed"]).inc();
            error!(reason, "Checkpoint failed: {}", e);
        }
    }
}
