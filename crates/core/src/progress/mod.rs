//! Durable run progress.
//!
//! [`ProgressState`] is the only state shared by all workers. It lives inside
//! a [`ProgressStore`], which serializes appends, takes consistent snapshots
//! for checkpoints and writes them atomically (temp file + rename).

mod store;
mod types;

pub use store::{ProgressStore, StartMode};
pub use types::{ProgressCounts, ProgressError, ProgressState, ResultArtifact};
