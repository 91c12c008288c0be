//! Traits for extraction sessions.

use async_trait::async_trait;

use super::{ExtractError, RawPlace};

/// One extraction session, owned by a single worker.
///
/// Calls are independent and must not touch shared run state. The caller
/// bounds each call with its own timeout.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name of this extractor for logging.
    fn name(&self) -> &str;

    /// Look up a place for the given query.
    async fn extract(&self, query: &str) -> Result<RawPlace, ExtractError>;

    /// Release resources held by the session.
    async fn close(&self) {}
}

/// Opens extraction sessions, one per worker.
#[async_trait]
pub trait ExtractorFactory: Send + Sync {
    async fn open_session(&self, worker_id: usize) -> Result<Box<dyn Extractor>, ExtractError>;
}
