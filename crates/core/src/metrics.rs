//! Prometheus metrics for extraction runs.
//!
//! This module provides metrics for:
//! - Workers (task results, extraction latency, active workers, lost sessions)
//! - Scoring (name similarity distribution)
//! - Progress (checkpoint writes)
//!
//! The CLI can dump the text exposition at the end of a run.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Registry holding every collector in [`all_metrics`].
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric).unwrap();
    }
    registry
});

// =============================================================================
// Worker Metrics
// =============================================================================

/// Tasks processed by result.
pub static TASKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("placematch_tasks_total", "Total tasks processed"),
        &["result"], // "found", "not_found", "timeout", "error", "panic"
    )
    .unwrap()
});

/// Extraction call duration in seconds.
pub static EXTRACT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "placematch_extract_duration_seconds",
            "Duration of one extraction call",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0]),
    )
    .unwrap()
});

/// Workers currently running.
pub static WORKERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("placematch_workers_active", "Number of running workers").unwrap()
});

/// Workers stopped by a lost session.
pub static SESSIONS_LOST: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "placematch_sessions_lost_total",
        "Total worker sessions lost mid-run",
    )
    .unwrap()
});

// =============================================================================
// Scoring Metrics
// =============================================================================

/// Name similarity of found places.
pub static NAME_SIMILARITY: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "placematch_name_similarity",
            "Distribution of name similarity for found places",
        )
        .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 1.0]),
    )
    .unwrap()
});

/// Confident matches.
pub static CONFIDENT_MATCHES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "placematch_confident_matches_total",
        "Total found places judged a confident match",
    )
    .unwrap()
});

// =============================================================================
// Progress Metrics
// =============================================================================

/// Checkpoint writes by status.
pub static CHECKPOINTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("placematch_checkpoints_total", "Total checkpoint writes"),
        &["status"], // "ok", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Workers
        Box::new(TASKS_TOTAL.clone()),
        Box::new(EXTRACT_DURATION.clone()),
        Box::new(WORKERS_ACTIVE.clone()),
        Box::new(SESSIONS_LOST.clone()),
        // Scoring
        Box::new(NAME_SIMILARITY.clone()),
        Box::new(CONFIDENT_MATCHES.clone()),
        // Progress
        Box::new(CHECKPOINTS_TOTAL.clone()),
    ]
}

/// Encode all metrics as Prometheus text format.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_returns_prometheus_format() {
        TASKS_TOTAL.with_label_values(&["found"]).inc();

        let output = render().unwrap();
        assert!(output.contains("placematch_tasks_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Vec metrics only appear once a label set has been touched
        TASKS_TOTAL.with_label_values(&["timeout"]).inc_by(0);
        CHECKPOINTS_TOTAL.with_label_values(&["ok"]).inc_by(0);
        EXTRACT_DURATION.observe(0.5);
        NAME_SIMILARITY.observe(0.9);

        let output = render().unwrap();
        assert!(output.contains("placematch_tasks_total"));
        assert!(output.contains("placematch_extract_duration_seconds"));
        assert!(output.contains("placematch_workers_active"));
        assert!(output.contains("placematch_sessions_lost_total"));
        assert!(output.contains("placematch_name_similarity"));
        assert!(output.contains("placematch_confident_matches_total"));
        assert!(output.contains("placematch_checkpoints_total"));
    }
}
