//! Mock extraction sessions for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::extractor::{ExtractError, Extractor, ExtractorFactory, RawPlace};

/// What a mock session does for a query.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return the name between the first pair of quotes in the query.
    Echo,
    /// Return this place.
    Found(RawPlace),
    /// Fail with this error.
    Fail(ExtractError),
    /// Panic with this message.
    Panic(String),
    /// Never return.
    Hang,
}

/// A recorded extraction call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    /// Worker whose session made the call.
    pub worker_id: usize,
    /// The query that was sent.
    pub query: String,
    /// When the call was made.
    pub timestamp: Instant,
}

/// A query handler that picks a response dynamically based on the query.
type QueryHandler = Box<dyn Fn(&str) -> Option<MockResponse> + Send + Sync>;

#[derive(Default)]
struct MockState {
    /// Responses keyed by a substring of the query.
    responses: RwLock<Vec<(String, MockResponse)>>,
    default_response: RwLock<Option<MockResponse>>,
    query_handler: RwLock<Option<QueryHandler>>,
    delay: RwLock<Duration>,
    queries: RwLock<Vec<RecordedQuery>>,
    /// Worker id -> number of calls after which its session is lost.
    session_loss: RwLock<HashMap<usize, usize>>,
    /// Calls made per worker.
    calls: RwLock<HashMap<usize, usize>>,
    failing_opens: RwLock<HashSet<usize>>,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Mock implementation of the ExtractorFactory trait.
///
/// All sessions opened from one factory share its configuration and
/// recording, so a test configures the factory and inspects it afterwards:
/// - Scripted responses per query substring, or a dynamic handler
/// - Simulated latency, failures, panics and hangs
/// - Per-worker session loss and session open failures
/// - Recorded queries and peak concurrency
///
/// # Example
///
/// ```rust,ignore
/// use placematch_core::testing::{MockExtractorFactory, MockResponse};
///
/// let factory = MockExtractorFactory::new();
/// factory.set_response("\"Closed Diner\"", MockResponse::Fail(ExtractError::NotFound)).await;
/// factory.lose_session_after(1, 3).await;
///
/// // Run the orchestrator with `factory`...
///
/// assert_eq!(factory.query_count().await, 10);
/// ```
#[derive(Clone, Default)]
pub struct MockExtractorFactory {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockExtractorFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockExtractorFactory")
            .field("responses", &"<responses>")
            .field("query_handler", &"<handler>")
            .field("queries", &"<queries>")
            .field(
                "sessions_opened",
                &self.state.sessions_opened.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl MockExtractorFactory {
    /// Create a factory whose sessions echo the quoted name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for `worker_id`, without going through `open_session`.
    pub fn extractor(&self, worker_id: usize) -> MockExtractor {
        MockExtractor {
            worker_id,
            name: format!("mock-{}", worker_id),
            state: Arc::clone(&self.state),
        }
    }

    /// Respond with `response` to every query containing `pattern`.
    ///
    /// The first matching pattern wins.
    pub async fn set_response(&self, pattern: &str, response: MockResponse) {
        self.state
            .responses
            .write()
            .await
            .push((pattern.to_string(), response));
    }

    /// Response for queries no pattern matches (default: [`MockResponse::Echo`]).
    pub async fn set_default_response(&self, response: MockResponse) {
        *self.state.default_response.write().await = Some(response);
    }

    /// Set a handler consulted before the scripted responses.
    ///
    /// Returning `None` falls through to the scripted responses.
    pub async fn set_query_handler<F>(&self, handler: F)
    where
        F: Fn(&str) -> Option<MockResponse> + Send + Sync + 'static,
    {
        *self.state.query_handler.write().await = Some(Box::new(handler));
    }

    /// Simulated latency of every call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.state.delay.write().await = delay;
    }

    /// Make the session of `worker_id` fail with `SessionClosed` once it
    /// has served `calls` queries.
    pub async fn lose_session_after(&self, worker_id: usize, calls: usize) {
        self.state
            .session_loss
            .write()
            .await
            .insert(worker_id, calls);
    }

    /// Make `open_session` fail for `worker_id`.
    pub async fn fail_open(&self, worker_id: usize) {
        self.state.failing_opens.write().await.insert(worker_id);
    }

    /// Get recorded queries.
    pub async fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.state.queries.read().await.clone()
    }

    /// Get the number of queries received.
    pub async fn query_count(&self) -> usize {
        self.state.queries.read().await.len()
    }

    /// Number of queries that contain `pattern`.
    pub async fn queries_matching(&self, pattern: &str) -> usize {
        self.state
            .queries
            .read()
            .await
            .iter()
            .filter(|q| q.query.contains(pattern))
            .count()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.sessions_closed.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in flight at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractorFactory for MockExtractorFactory {
    async fn open_session(&self, worker_id: usize) -> Result<Box<dyn Extractor>, ExtractError> {
        if self.state.failing_opens.read().await.contains(&worker_id) {
            return Err(ExtractError::SessionClosed(format!(
                "mock session {} failed to open",
                worker_id
            )));
        }
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.extractor(worker_id)))
    }
}

/// Mock implementation of the Extractor trait.
///
/// Created through [`MockExtractorFactory`].
pub struct MockExtractor {
    worker_id: usize,
    name: String,
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockExtractor")
            .field("worker_id", &self.worker_id)
            .field("state", &"<shared>")
            .finish()
    }
}

impl MockExtractor {
    async fn response_for(&self, query: &str) -> MockResponse {
        if let Some(ref handler) = *self.state.query_handler.read().await {
            if let Some(response) = handler(query) {
                return response;
            }
        }
        let scripted = self
            .state
            .responses
            .read()
            .await
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
            .map(|(_, response)| response.clone());
        if let Some(response) = scripted {
            return response;
        }
        self.state
            .default_response
            .read()
            .await
            .clone()
            .unwrap_or(MockResponse::Echo)
    }

    /// Count this call and report whether the session is gone.
    async fn register_call(&self) -> bool {
        let mut calls = self.state.calls.write().await;
        let made = calls.entry(self.worker_id).or_insert(0);
        let limit = self.state.session_loss.read().await.get(&self.worker_id).copied();
        if limit.is_some_and(|limit| *made >= limit) {
            return true;
        }
        *made += 1;
        false
    }
}

/// Decrements the in-flight counter even if the call panics.
struct InFlight<'a>(&'a MockState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a MockState) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, query: &str) -> Result<RawPlace, ExtractError> {
        if self.register_call().await {
            return Err(ExtractError::SessionClosed(format!(
                "mock session {} lost",
                self.worker_id
            )));
        }

        self.state.queries.write().await.push(RecordedQuery {
            worker_id: self.worker_id,
            query: query.to_string(),
            timestamp: Instant::now(),
        });

        let _in_flight = InFlight::enter(&self.state);

        let delay = *self.state.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.response_for(query).await {
            MockResponse::Echo => Ok(echo(query)),
            MockResponse::Found(place) => Ok(place),
            MockResponse::Fail(err) => Err(err),
            MockResponse::Panic(message) => panic!("{}", message),
            MockResponse::Hang => std::future::pending().await,
        }
    }

    async fn close(&self) {
        self.state.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Place named after the quoted part of the query.
fn echo(query: &str) -> RawPlace {
    let mut parts = query.splitn(3, '"');
    let _ = parts.next();
    let name = parts.next().map(str::to_string);
    let address = parts
        .next()
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
        .map(str::to_string);
    RawPlace {
        name,
        address,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_by_default() {
        let factory = MockExtractorFactory::new();
        let session = factory.open_session(0).await.unwrap();

        let place = session
            .extract("\"Joe's Pizza\" 123 Bleecker St Manhattan NYC")
            .await
            .unwrap();
        assert_eq!(place.name.as_deref(), Some("Joe's Pizza"));
        assert_eq!(
            place.address.as_deref(),
            Some("123 Bleecker St Manhattan NYC")
        );
        assert_eq!(factory.sessions_opened(), 1);
        assert_eq!(factory.query_count().await, 1);
    }

    #[tokio::test]
    async fn test_scripted_responses() {
        let factory = MockExtractorFactory::new();
        factory
            .set_response("\"Gone\"", MockResponse::Fail(ExtractError::NotFound))
            .await;
        factory
            .set_default_response(MockResponse::Fail(ExtractError::Timeout))
            .await;
        let session = factory.extractor(0);

        assert_eq!(
            session.extract("\"Gone\" 1 Main St").await,
            Err(ExtractError::NotFound)
        );
        assert_eq!(
            session.extract("\"Other\" 1 Main St").await,
            Err(ExtractError::Timeout)
        );
        assert_eq!(factory.queries_matching("\"Gone\"").await, 1);
    }

    #[tokio::test]
    async fn test_query_handler_takes_precedence() {
        let factory = MockExtractorFactory::new();
        factory
            .set_response("Main", MockResponse::Fail(ExtractError::NotFound))
            .await;
        factory
            .set_query_handler(|query| {
                query.contains("special").then(|| {
                    MockResponse::Found(RawPlace {
                        name: Some("Special".to_string()),
                        ..Default::default()
                    })
                })
            })
            .await;
        let session = factory.extractor(0);

        let place = session.extract("\"special\" 1 Main St").await.unwrap();
        assert_eq!(place.name.as_deref(), Some("Special"));
        assert!(session.extract("\"plain\" 1 Main St").await.is_err());
    }

    #[tokio::test]
    async fn test_session_loss_after_calls() {
        let factory = MockExtractorFactory::new();
        factory.lose_session_after(1, 2).await;
        let lost = factory.extractor(1);
        let healthy = factory.extractor(2);

        assert!(lost.extract("\"a\"").await.is_ok());
        assert!(lost.extract("\"b\"").await.is_ok());
        let err = lost.extract("\"c\"").await.unwrap_err();
        assert!(err.is_session_fatal());
        assert!(healthy.extract("\"c\"").await.is_ok());
        // The refused call is not recorded
        assert_eq!(factory.query_count().await, 3);
    }

    #[tokio::test]
    async fn test_fail_open() {
        let factory = MockExtractorFactory::new();
        factory.fail_open(3).await;
        assert!(factory.open_session(3).await.is_err());
        assert!(factory.open_session(0).await.is_ok());
        assert_eq!(factory.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_close_is_counted() {
        let factory = MockExtractorFactory::new();
        let session = factory.open_session(0).await.unwrap();
        session.close().await;
        assert_eq!(factory.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_tracks_concurrency() {
        let factory = MockExtractorFactory::new();
        factory.set_delay(Duration::from_millis(50)).await;
        let a = factory.extractor(0);
        let b = factory.extractor(1);

        let (ra, rb) = tokio::join!(a.extract("\"a\""), b.extract("\"b\""));
        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(factory.max_concurrency(), 2);
    }
}
