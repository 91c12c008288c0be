//! Rolling throughput and ETA reporting.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Number of recent task durations kept for rate estimation.
pub const WINDOW_CAPACITY: usize = 50;

#[derive(Debug)]
struct ReporterInner {
    window: VecDeque<Duration>,
    completed: usize,
    found: usize,
    failed: usize,
}

/// Aggregates per-task timings reported by all workers.
///
/// Holds its own counters; it never reads the progress store or the queue.
#[derive(Debug)]
pub struct ProgressReporter {
    total: usize,
    started_at: Instant,
    inner: Mutex<ReporterInner>,
}

/// Point-in-time view of run progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterSnapshot {
    pub completed: usize,
    pub total: usize,
    pub found: usize,
    pub failed: usize,
    /// Tasks per minute over the recent window.
    pub rate_per_min: f64,
    pub eta: Option<Duration>,
    pub elapsed: Duration,
}

impl ReporterSnapshot {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }

    /// Completion percentage in [0, 100].
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    pub fn eta_display(&self) -> String {
        self.eta.map(format_eta).unwrap_or_else(|| "--".to_string())
    }
}

impl ProgressReporter {
    /// `total` is the number of tasks queued for this run.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started_at: Instant::now(),
            inner: Mutex::new(ReporterInner {
                window: VecDeque::with_capacity(WINDOW_CAPACITY),
                completed: 0,
                found: 0,
                failed: 0,
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Record one finished task and its wall-clock duration.
    pub fn record(&self, found: bool, duration: Duration) {
        let mut inner = self.lock();
        if inner.window.len() == WINDOW_CAPACITY {
            inner.window.pop_front();
        }
        inner.window.push_back(duration);
        inner.completed += 1;
        if found {
            inner.found += 1;
        } else {
            inner.failed += 1;
        }
    }

    pub fn snapshot(&self) -> ReporterSnapshot {
        let inner = self.lock();
        let mean = mean_duration(&inner.window);
        let remaining = self.total.saturating_sub(inner.completed);

        let rate_per_min = match mean {
            Some(m) if !m.is_zero() => 60.0 / m.as_secs_f64(),
            _ => 0.0,
        };
        let eta = mean.map(|m| m.mul_f64(remaining as f64));

        ReporterSnapshot {
            completed: inner.completed,
            total: self.total,
            found: inner.found,
            failed: inner.failed,
            rate_per_min,
            eta,
            elapsed: self.started_at.elapsed(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReporterInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn mean_duration(window: &VecDeque<Duration>) -> Option<Duration> {
    if window.is_empty() {
        return None;
    }
    let sum: Duration = window.iter().sum();
    Some(sum / window.len() as u32)
}

/// Format an ETA as `45s`, `12m` or `1h 5m`.
pub fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(Duration::from_secs(0)), "0s");
        assert_eq!(format_eta(Duration::from_secs(45)), "45s");
        assert_eq!(format_eta(Duration::from_secs(59)), "59s");
        assert_eq!(format_eta(Duration::from_secs(60)), "1m");
        assert_eq!(format_eta(Duration::from_secs(12 * 60 + 30)), "12m");
        assert_eq!(format_eta(Duration::from_secs(3600)), "1h 0m");
        assert_eq!(format_eta(Duration::from_secs(3900)), "1h 5m");
    }

    #[test]
    fn test_snapshot_before_any_sample() {
        let reporter = ProgressReporter::new(10);
        let snap = reporter.snapshot();
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.remaining(), 10);
        assert_eq!(snap.eta, None);
        assert_eq!(snap.rate_per_min, 0.0);
        assert_eq!(snap.eta_display(), "--");
    }

    #[test]
    fn test_rate_and_eta() {
        let reporter = ProgressReporter::new(10);
        reporter.record(true, Duration::from_secs(2));
        reporter.record(false, Duration::from_secs(4));

        let snap = reporter.snapshot();
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.found, 1);
        assert_eq!(snap.failed, 1);
        // mean 3s -> 20 tasks/min
        assert!((snap.rate_per_min - 20.0).abs() < 1e-9);
        // 8 remaining * 3s
        assert_eq!(snap.eta, Some(Duration::from_secs(24)));
        assert_eq!(snap.eta_display(), "24s");
        assert_eq!(snap.percent(), 20.0);
    }

    #[test]
    fn test_window_is_bounded() {
        let reporter = ProgressReporter::new(1000);
        for _ in 0..WINDOW_CAPACITY {
            reporter.record(true, Duration::from_secs(10));
        }
        for _ in 0..WINDOW_CAPACITY {
            reporter.record(true, Duration::from_secs(1));
        }
        let snap = reporter.snapshot();
        assert_eq!(snap.completed, 2 * WINDOW_CAPACITY);
        // Older slow samples have rolled out
        assert!((snap.rate_per_min - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_eta_zero_when_done() {
        let reporter = ProgressReporter::new(1);
        reporter.record(true, Duration::from_millis(500));
        assert_eq!(reporter.snapshot().eta, Some(Duration::ZERO));
    }
}
