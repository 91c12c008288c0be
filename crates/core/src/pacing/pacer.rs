//! Per-worker pacing delay.

use std::time::Duration;

use rand::Rng;

use super::config::PacingSettings;

/// Decides how long a worker waits after each task.
///
/// Each worker owns its own pacer, so batch counting is per worker.
#[derive(Debug, Clone)]
pub struct Pacer {
    min_delay: Duration,
    max_delay: Duration,
    batch_size: u32,
    batch_pause: Duration,
    completed: u32,
}

impl Pacer {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            batch_size: 0,
            batch_pause: Duration::ZERO,
            completed: 0,
        }
    }

    pub fn from_settings(settings: &PacingSettings) -> Self {
        Self::new(settings.min_delay, settings.max_delay)
            .with_batch_pause(settings.batch_size, settings.batch_pause)
    }

    /// After every `batch_size` tasks, wait `pause` instead of the usual delay.
    pub fn with_batch_pause(mut self, batch_size: u32, pause: Duration) -> Self {
        self.batch_size = batch_size;
        self.batch_pause = pause;
        self
    }

    /// Record a finished task and return the delay before the next one.
    pub fn next_delay(&mut self) -> Duration {
        self.completed += 1;
        if self.batch_size > 0 && self.completed % self.batch_size == 0 {
            return self.batch_pause;
        }
        self.random_delay()
    }

    /// Whether the last delay returned was a batch pause.
    pub fn at_batch_boundary(&self) -> bool {
        self.batch_size > 0 && self.completed > 0 && self.completed % self.batch_size == 0
    }

    fn random_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let min = self.min_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        Duration::from_secs_f64(rand::thread_rng().gen_range(min..=max))
    }
}
