//! Progress state and artifact types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::outcome::ExtractionOutcome;

/// Errors from the progress store.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("checkpoint not found: {0}")]
    Missing(String),

    #[error("checkpoint {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize checkpoint: {0}")]
    Serialize(String),

    #[error("key already recorded: {0}")]
    DuplicateKey(String),

    #[error("progress store is sealed, no further updates accepted")]
    Sealed,
}

/// Completed keys plus the outcomes recorded for them.
///
/// Invariant: every key in `completed_keys` has exactly one outcome in
/// `successes` or `failures`, and vice versa.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(rename = "scraped_ids", default)]
    completed_keys: HashSet<String>,
    #[serde(rename = "results", default)]
    successes: Vec<ExtractionOutcome>,
    #[serde(rename = "failed", default)]
    failures: Vec<ExtractionOutcome>,
    #[serde(
        rename = "last_updated",
        default,
        deserialize_with = "crate::timestamp::deserialize_option"
    )]
    last_checkpoint_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run_id: Option<String>,
}

/// Sizes of the progress state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounts {
    pub completed: usize,
    pub successes: usize,
    pub failures: usize,
    pub confident: usize,
}

impl ProgressCounts {
    /// Found / completed, as a percentage.
    pub fn match_rate(&self) -> f64 {
        self.successes as f64 / self.completed.max(1) as f64 * 100.0
    }
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome. Fails if its key was already recorded.
    pub fn record(&mut self, outcome: ExtractionOutcome) -> Result<(), ProgressError> {
        let key = outcome.key();
        if !self.completed_keys.insert(key.clone()) {
            return Err(ProgressError::DuplicateKey(key));
        }
        if outcome.found {
            self.successes.push(outcome);
        } else {
            self.failures.push(outcome);
        }
        Ok(())
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed_keys.contains(key)
    }

    pub fn completed_keys(&self) -> &HashSet<String> {
        &self.completed_keys
    }

    pub fn successes(&self) -> &[ExtractionOutcome] {
        &self.successes
    }

    pub fn failures(&self) -> &[ExtractionOutcome] {
        &self.failures
    }

    pub fn last_checkpoint_at(&self) -> Option<DateTime<Utc>> {
        self.last_checkpoint_at
    }

    pub fn input_fingerprint(&self) -> Option<&str> {
        self.input_fingerprint.as_deref()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn counts(&self) -> ProgressCounts {
        ProgressCounts {
            completed: self.completed_keys.len(),
            successes: self.successes.len(),
            failures: self.failures.len(),
            confident: self.successes.iter().filter(|o| o.is_confident()).count(),
        }
    }

    pub(crate) fn set_last_checkpoint_at(&mut self, at: DateTime<Utc>) {
        self.last_checkpoint_at = Some(at);
    }

    pub(crate) fn set_input_fingerprint(&mut self, fingerprint: Option<String>) {
        self.input_fingerprint = fingerprint;
    }

    pub(crate) fn set_run_id(&mut self, run_id: String) {
        self.run_id = Some(run_id);
    }

    /// Check the key/outcome invariant.
    pub fn validate(&self) -> Result<(), String> {
        let outcomes = self.successes.len() + self.failures.len();
        if self.completed_keys.len() != outcomes {
            return Err(format!(
                "{} completed keys but {} recorded outcomes",
                self.completed_keys.len(),
                outcomes
            ));
        }

        let mut seen = HashSet::with_capacity(outcomes);
        for (outcome, expected_found) in self
            .successes
            .iter()
            .map(|o| (o, true))
            .chain(self.failures.iter().map(|o| (o, false)))
        {
            let key = outcome.key();
            if outcome.found != expected_found {
                return Err(format!("outcome for {} is filed under the wrong list", key));
            }
            if !self.completed_keys.contains(&key) {
                return Err(format!("outcome for {} has no completed key", key));
            }
            if !seen.insert(key.clone()) {
                return Err(format!("key {} has more than one outcome", key));
            }
        }
        Ok(())
    }
}

/// Final result artifact: successful outcomes only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultArtifact {
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub scraped_at: DateTime<Utc>,
    pub count: usize,
    pub results: Vec<ExtractionOutcome>,
}

impl ResultArtifact {
    pub fn from_state(state: &ProgressState) -> Self {
        Self {
            scraped_at: Utc::now(),
            count: state.successes.len(),
            results: state.successes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::extractor::RawPlace;

    fn found(name: &str) -> ExtractionOutcome {
        let entity = Entity::new(name, "1 Main St", "Pizza", "Queens");
        ExtractionOutcome::found(
            &entity,
            "q",
            RawPlace {
                name: Some(name.to_string()),
                ..Default::default()
            },
        )
    }

    fn failed(name: &str) -> ExtractionOutcome {
        let entity = Entity::new(name, "1 Main St", "Pizza", "Queens");
        ExtractionOutcome::failed(&entity, "q", "timeout")
    }

    #[test]
    fn test_record_splits_by_found() {
        let mut state = ProgressState::new();
        state.record(found("a")).unwrap();
        state.record(failed("b")).unwrap();

        assert_eq!(state.successes().len(), 1);
        assert_eq!(state.failures().len(), 1);
        assert!(state.is_completed("a|1 Main St"));
        assert!(state.is_completed("b|1 Main St"));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_record_rejects_duplicate_key() {
        let mut state = ProgressState::new();
        state.record(found("a")).unwrap();
        let err = state.record(failed("a")).unwrap_err();
        assert!(matches!(err, ProgressError::DuplicateKey(k) if k == "a|1 Main St"));
        assert_eq!(state.counts().completed, 1);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_orphan_key() {
        let mut state = ProgressState::new();
        state.record(found("a")).unwrap();
        state.completed_keys.insert("ghost|nowhere".to_string());
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_validate_detects_duplicate_outcome() {
        let mut state = ProgressState::new();
        state.record(found("a")).unwrap();
        state.successes.push(found("a"));
        state.completed_keys.insert("other|key".to_string());
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_counts_and_match_rate() {
        let mut state = ProgressState::new();
        state.record(found("a")).unwrap();
        state.record(found("b")).unwrap();
        state.record(failed("c")).unwrap();
        state.record(failed("d")).unwrap();

        let counts = state.counts();
        assert_eq!(counts.completed, 4);
        assert_eq!(counts.successes, 2);
        assert_eq!(counts.failures, 2);
        assert_eq!(counts.match_rate(), 50.0);
        assert_eq!(ProgressCounts::default().match_rate(), 0.0);
    }

    #[test]
    fn test_serialized_layout() {
        let mut state = ProgressState::new();
        state.record(found("a")).unwrap();
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["scraped_ids"][0], "a|1 Main St");
        assert_eq!(value["results"].as_array().unwrap().len(), 1);
        assert_eq!(value["failed"].as_array().unwrap().len(), 0);
        assert!(value["last_updated"].is_null());
    }

    #[test]
    fn test_load_checkpoint_with_naive_timestamps() {
        let json = r#"{
            "scraped_ids": ["Joe's Pizza|123 Bleecker St", "Ghost Diner|9 Nowhere Ave"],
            "results": [{
                "original_name": "Joe's Pizza",
                "original_address": "123 Bleecker St",
                "original_category": "Pizza",
                "original_boro": "Manhattan",
                "search_query": "\"Joe's Pizza\" 123 Bleecker St Manhattan NYC",
                "scraped_at": "2024-01-15T10:30:00.123456",
                "found": true,
                "google_name": "Joe's Pizza",
                "name_similarity": 1.0,
                "confident_match": true
            }],
            "failed": [{
                "original_name": "Ghost Diner",
                "original_address": "9 Nowhere Ave",
                "original_category": "Diner",
                "original_boro": "Queens",
                "search_query": "\"Ghost Diner\" 9 Nowhere Ave Queens NYC",
                "scraped_at": "2024-01-15T10:31:02",
                "found": false,
                "error": "no name found"
            }],
            "last_updated": "2024-01-15T10:31:05.5"
        }"#;
        let state: ProgressState = serde_json::from_str(json).unwrap();

        assert!(state.validate().is_ok());
        assert_eq!(state.counts().completed, 2);
        assert_eq!(state.counts().confident, 1);
        let last = state.last_checkpoint_at().unwrap();
        assert_eq!(last.to_rfc3339(), "2024-01-15T10:31:05.500+00:00");
        assert_eq!(
            state.failures()[0].scraped_at.to_rfc3339(),
            "2024-01-15T10:31:02+00:00"
        );
    }

    #[test]
    fn test_result_artifact_only_successes() {
        let mut state = ProgressState::new();
        state.record(found("a")).unwrap();
        state.record(failed("b")).unwrap();
        let artifact = ResultArtifact::from_state(&state);
        assert_eq!(artifact.count, 1);
        assert_eq!(artifact.results[0].original_name, "a");
    }
}
