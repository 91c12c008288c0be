//! Pacing against the lookup source.
//!
//! Two layers:
//! - [`Pacer`]: per-worker randomized delay after each task, with an optional
//!   longer pause after every batch
//! - [`SharedRateLimiter`]: optional token bucket shared by all workers that
//!   caps the total request rate

mod config;
mod pacer;
mod rate_limiter;

pub use config::{PacingConfig, PacingSettings};
pub use pacer::Pacer;
pub use rate_limiter::{RateLimitStatus, SharedRateLimiter, TokenBucket};
