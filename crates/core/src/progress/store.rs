//! Lock-guarded progress store with atomic checkpoint writes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::outcome::ExtractionOutcome;

use super::types::{ProgressCounts, ProgressError, ProgressState, ResultArtifact};

/// How to initialize progress when opening the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Start empty. An existing checkpoint is moved aside to `<path>.bak`.
    Fresh,
    /// Load the existing checkpoint. A missing or corrupt checkpoint is an
    /// error unless `fresh_on_corrupt` is set.
    Resume { fresh_on_corrupt: bool },
}

/// Owner of the run's [`ProgressState`].
///
/// Workers append through [`ProgressStore::record`]; checkpoint writers take a
/// snapshot under the lock and write it outside the lock, serialized by a
/// second lock so temp-file renames never interleave.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    state: Mutex<ProgressState>,
    write_lock: Mutex<()>,
    checkpoints_written: AtomicU64,
    sealed: AtomicBool,
}

impl ProgressStore {
    /// Create a store around an existing state without touching disk.
    pub fn with_state(path: impl Into<PathBuf>, state: ProgressState) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(state),
            write_lock: Mutex::new(()),
            checkpoints_written: AtomicU64::new(0),
            sealed: AtomicBool::new(false),
        }
    }

    /// Open the checkpoint at `path` according to `mode`.
    ///
    /// `fingerprint` identifies the input entity list; resuming against a
    /// different input is allowed but logged.
    pub async fn open(
        path: impl Into<PathBuf>,
        mode: StartMode,
        fingerprint: Option<String>,
    ) -> Result<Self, ProgressError> {
        let path = path.into();

        let mut state = match mode {
            StartMode::Fresh => {
                if tokio::fs::try_exists(&path).await? {
                    let backup = sibling(&path, "bak");
                    warn!(
                        "Starting fresh; moving existing checkpoint {:?} to {:?}",
                        path, backup
                    );
                    tokio::fs::rename(&path, &backup).await?;
                }
                ProgressState::new()
            }
            StartMode::Resume { fresh_on_corrupt } => match load_state(&path).await {
                Ok(state) => {
                    let counts = state.counts();
                    info!(
                        "Resuming from checkpoint {:?}: {} completed ({} found, {} failed)",
                        path, counts.completed, counts.successes, counts.failures
                    );
                    if let (Some(saved), Some(current)) =
                        (state.input_fingerprint(), fingerprint.as_deref())
                    {
                        if saved != current {
                            warn!(
                                saved,
                                current, "Checkpoint was written for a different input list"
                            );
                        }
                    }
                    state
                }
                Err(e @ (ProgressError::Missing(_) | ProgressError::Corrupt { .. }))
                    if fresh_on_corrupt =>
                {
                    warn!("{}; starting fresh as requested", e);
                    if tokio::fs::try_exists(&path).await? {
                        tokio::fs::rename(&path, sibling(&path, "bak")).await?;
                    }
                    ProgressState::new()
                }
                Err(e) => return Err(e),
            },
        };

        state.set_input_fingerprint(fingerprint);
        Ok(Self::with_state(path, state))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an outcome under exclusive access.
    pub async fn record(&self, outcome: ExtractionOutcome) -> Result<ProgressCounts, ProgressError> {
        if self.sealed.load(Ordering::SeqCst) {
            return Err(ProgressError::Sealed);
        }
        let mut state = self.state.lock().await;
        state.record(outcome)?;
        Ok(state.counts())
    }

    /// Copy of the completed key set.
    pub async fn completed_keys(&self) -> HashSet<String> {
        self.state.lock().await.completed_keys().clone()
    }

    pub async fn counts(&self) -> ProgressCounts {
        self.state.lock().await.counts()
    }

    /// Consistent copy of the whole state.
    pub async fn snapshot(&self) -> ProgressState {
        self.state.lock().await.clone()
    }

    pub fn checkpoints_written(&self) -> u64 {
        self.checkpoints_written.load(Ordering::Relaxed)
    }

    /// Mark the run for checkpoints written from now on.
    pub async fn set_run_id(&self, run_id: impl Into<String>) -> Result<(), ProgressError> {
        let mut state = self.state.lock().await;
        if self.sealed.load(Ordering::SeqCst) {
            return Err(ProgressError::Sealed);
        }
        state.set_run_id(run_id.into());
        Ok(())
    }

    /// Durably write the current state.
    ///
    /// Appends keep flowing while the snapshot is serialized and written.
    pub async fn checkpoint(&self) -> Result<DateTime<Utc>, ProgressError> {
        let _writer = self.write_lock.lock().await;

        let now = Utc::now();
        let mut snapshot = self.snapshot().await;
        snapshot.set_last_checkpoint_at(now);

        let bytes = serde_json::to_vec(&snapshot).map_err(|e| ProgressError::Serialize(e.to_string()))?;
        write_atomic(&self.path, &bytes).await?;

        if !self.sealed.load(Ordering::SeqCst) {
            self.state.lock().await.set_last_checkpoint_at(now);
        }
        let n = self.checkpoints_written.fetch_add(1, Ordering::Relaxed) + 1;
        let counts = snapshot.counts();
        debug!(
            checkpoint = n,
            completed = counts.completed,
            "Checkpoint written to {:?}",
            self.path
        );
        Ok(now)
    }

    /// Write the final checkpoint and refuse further appends.
    pub async fn seal(&self) -> Result<DateTime<Utc>, ProgressError> {
        let at = self.checkpoint().await?;
        self.sealed.store(true, Ordering::SeqCst);
        Ok(at)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Write the successes-only result artifact.
    pub async fn write_results(&self, path: &Path) -> Result<ResultArtifact, ProgressError> {
        let artifact = ResultArtifact::from_state(&self.snapshot().await);
        let bytes = serde_json::to_vec_pretty(&artifact)
            .map_err(|e| ProgressError::Serialize(e.to_string()))?;
        write_atomic(path, &bytes).await?;
        info!("Wrote {} results to {:?}", artifact.count, path);
        Ok(artifact)
    }
}

/// Load and validate a checkpoint file.
pub(crate) async fn load_state(path: &Path) -> Result<ProgressState, ProgressError> {
    if !tokio::fs::try_exists(path).await? {
        return Err(ProgressError::Missing(path.display().to_string()));
    }
    let raw = tokio::fs::read(path).await?;
    let corrupt = |reason: String| ProgressError::Corrupt {
        path: path.display().to_string(),
        reason,
    };
    let state: ProgressState = serde_json::from_slice(&raw).map_err(|e| corrupt(e.to_string()))?;
    state.validate().map_err(corrupt)?;
    Ok(state)
}

/// `<path>.<suffix>`, keeping the original extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Write via a temp file in the same directory, fsync, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ProgressError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = sibling(path, "tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::extractor::RawPlace;
    use tempfile::TempDir;

    fn outcome(name: &str, found: bool) -> ExtractionOutcome {
        let entity = Entity::new(name, "1 Main St", "Thai", "Bronx");
        if found {
            ExtractionOutcome::found(
                &entity,
                "q",
                RawPlace {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
            )
        } else {
            ExtractionOutcome::failed(&entity, "q", "timeout")
        }
    }

    #[tokio::test]
    async fn test_fresh_open_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::open(dir.path().join("p.json"), StartMode::Fresh, None)
            .await
            .unwrap();
        assert_eq!(store.counts().await.completed, 0);
    }

    #[tokio::test]
    async fn test_resume_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = ProgressStore::open(
            dir.path().join("p.json"),
            StartMode::Resume {
                fresh_on_corrupt: false,
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProgressError::Missing(_)));
    }

    #[tokio::test]
    async fn test_resume_corrupt_file_fails_loudly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let err = ProgressStore::open(
            &path,
            StartMode::Resume {
                fresh_on_corrupt: false,
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProgressError::Corrupt { .. }));
        // Prior file is left untouched
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn test_resume_invariant_violation_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        tokio::fs::write(
            &path,
            br#"{"scraped_ids": ["a|b"], "results": [], "failed": [], "last_updated": null}"#,
        )
        .await
        .unwrap();

        let err = ProgressStore::open(
            &path,
            StartMode::Resume {
                fresh_on_corrupt: false,
            },
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProgressError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_resume_corrupt_with_fresh_fallback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        tokio::fs::write(&path, b"garbage").await.unwrap();

        let store = ProgressStore::open(
            &path,
            StartMode::Resume {
                fresh_on_corrupt: true,
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(store.counts().await.completed, 0);
        assert!(dir.path().join("p.json.bak").exists());
    }

    #[tokio::test]
    async fn test_fresh_open_backs_up_existing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.json");
        let store = ProgressStore::open(&path, StartMode::Fresh, None).await.unwrap();
        store.record(outcome("a", true)).await.unwrap();
        store.checkpoint().await.unwrap();

        let store = ProgressStore::open(&path, StartMode::Fresh, None).await.unwrap();
        assert_eq!(store.counts().await.completed, 0);
        assert!(!path.exists());
        assert!(dir.path().join("p.json.bak").exists());
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("p.json");
        let store = ProgressStore::open(&path, StartMode::Fresh, Some("abc".to_string()))
            .await
            .unwrap();
        store.set_run_id("run-1").await.unwrap();
        store.record(outcome("a", true)).await.unwrap();
        store.record(outcome("b", false)).await.unwrap();
        store.record(outcome("c", true)).await.unwrap();
        let at = store.checkpoint().await.unwrap();
        assert_eq!(store.checkpoints_written(), 1);

        let original = store.snapshot().await;
        assert_eq!(original.last_checkpoint_at(), Some(at));

        let reopened = ProgressStore::open(
            &path,
            StartMode::Resume {
                fresh_on_corrupt: false,
            },
            Some("abc".to_string()),
        )
        .await
        .unwrap();
        let loaded = reopened.snapshot().await;

        assert_eq!(loaded, original);
        assert_eq!(loaded.input_fingerprint(), Some("abc"));
        assert_eq!(loaded.run_id(), Some("run-1"));
        assert!(!dir.path().join("nested").join("p.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_record_duplicate_is_rejected() {
        let store = ProgressStore::with_state("unused.json", ProgressState::new());
        store.record(outcome("a", true)).await.unwrap();
        let err = store.record(outcome("a", false)).await.unwrap_err();
        assert!(matches!(err, ProgressError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_sealed_store_rejects_appends() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::open(dir.path().join("p.json"), StartMode::Fresh, None)
            .await
            .unwrap();
        store.record(outcome("a", true)).await.unwrap();
        store.seal().await.unwrap();

        assert!(store.is_sealed());
        let err = store.record(outcome("b", true)).await.unwrap_err();
        assert!(matches!(err, ProgressError::Sealed));
        assert_eq!(store.counts().await.completed, 1);

        let err = store.set_run_id("late-run").await.unwrap_err();
        assert!(matches!(err, ProgressError::Sealed));
        assert_eq!(store.snapshot().await.run_id(), None);
    }

    #[tokio::test]
    async fn test_checkpoint_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // A directory where the checkpoint file should be makes the rename fail.
        let path = dir.path().join("p.json");
        tokio::fs::create_dir_all(path.join("occupied")).await.unwrap();

        let store = ProgressStore::with_state(&path, ProgressState::new());
        store.record(outcome("a", true)).await.unwrap();
        assert!(store.checkpoint().await.is_err());
        assert_eq!(store.checkpoints_written(), 0);
        // Appends still work after a failed write
        store.record(outcome("b", true)).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_results() {
        let dir = TempDir::new().unwrap();
        let store = ProgressStore::with_state(dir.path().join("p.json"), ProgressState::new());
        store.record(outcome("a", true)).await.unwrap();
        store.record(outcome("b", false)).await.unwrap();

        let out = dir.path().join("results.json");
        let artifact = store.write_results(&out).await.unwrap();
        assert_eq!(artifact.count, 1);

        let parsed: ResultArtifact =
            serde_json::from_slice(&tokio::fs::read(&out).await.unwrap()).unwrap();
        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.results[0].original_name, "a");
    }
}
