//! Token bucket rate limiter shared by all workers.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::trace;

/// Rate limit status snapshot.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub requests_per_minute: u32,
    pub tokens_available: f32,
    pub next_available_in_ms: Option<u64>,
}

/// Token bucket: tokens refill at a constant rate and each request takes one.
///
/// The bucket starts full, so a burst up to the capacity is allowed.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens (= requests per minute).
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / 60.0,
            last_refill: Instant::now(),
        }
    }

    /// Take a token, or return how long to wait until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Err(Duration::from_secs_f32(tokens_needed / self.refill_rate))
        }
    }

    pub fn status(&mut self) -> RateLimitStatus {
        self.refill();
        RateLimitStatus {
            requests_per_minute: self.capacity as u32,
            tokens_available: self.tokens,
            next_available_in_ms: if self.tokens >= 1.0 {
                None
            } else {
                let tokens_needed = 1.0 - self.tokens;
                Some((tokens_needed / self.refill_rate * 1000.0) as u64)
            },
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Request-rate cap shared across workers. Disabled when built with 0 rpm.
#[derive(Debug)]
pub struct SharedRateLimiter {
    bucket: Option<Mutex<TokenBucket>>,
}

impl SharedRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            bucket: (requests_per_minute > 0).then(|| Mutex::new(TokenBucket::new(requests_per_minute))),
        }
    }

    pub fn unlimited() -> Self {
        Self { bucket: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.bucket.is_some()
    }

    /// Wait until a request may be made.
    ///
    /// The lock is released while sleeping so other workers can check in.
    pub async fn acquire(&self) {
        let Some(bucket) = &self.bucket else {
            return;
        };
        loop {
            let wait = match bucket.lock().await.try_acquire() {
                Ok(()) => return,
                Err(wait) => wait,
            };
            trace!(wait_ms = wait.as_millis() as u64, "Rate limited, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn status(&self) -> Option<RateLimitStatus> {
        match &self.bucket {
            Some(bucket) => Some(bucket.lock().await.status()),
            None => None,
        }
    }
}
