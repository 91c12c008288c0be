//! HTTP lookup-service extractor.
//!
//! Issues `GET {base_url}?{query_param}={query}` and reads a JSON place
//! document. Every field is optional and may be raw page text; it is cleaned
//! with [`super::fields`] before being returned.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ExtractorConfig;

use super::fields::{clean_address, clean_category, clean_name, parse_rating, parse_review_count};
use super::{ExtractError, Extractor, ExtractorFactory, RawPlace};

/// Place document returned by the lookup service.
#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    rating: Option<Value>,
    #[serde(default, alias = "review_count")]
    reviews: Option<Value>,
    #[serde(default)]
    url: Option<String>,
}

impl LookupResponse {
    fn into_place(self) -> RawPlace {
        RawPlace {
            name: self.name.as_deref().and_then(clean_name),
            address: self.address.as_deref().and_then(clean_address),
            category: self.category.as_deref().and_then(clean_category),
            rating: self.rating.as_ref().and_then(|v| match v {
                Value::Number(n) => n.as_f64().map(|f| f as f32),
                Value::String(s) => parse_rating(s),
                _ => None,
            }),
            review_count: self.reviews.as_ref().and_then(|v| match v {
                Value::Number(n) => n.as_u64().and_then(|c| u32::try_from(c).ok()),
                Value::String(s) => parse_review_count(s),
                _ => None,
            }),
            url: self.url,
        }
    }
}

/// Extraction session backed by an HTTP lookup service.
pub struct HttpExtractor {
    client: Client,
    config: ExtractorConfig,
    name: String,
}

impl HttpExtractor {
    /// Create a session with its own HTTP client.
    pub fn new(config: ExtractorConfig, worker_id: usize) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ExtractError::SessionClosed(format!("failed to build client: {}", e)))?;

        Ok(Self {
            client,
            config,
            name: format!("http-{}", worker_id),
        })
    }

    /// Build the lookup URL for a query.
    fn build_url(&self, query: &str) -> String {
        format!(
            "{}?{}={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.query_param),
            urlencoding::encode(query)
        )
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self, query: &str) -> Result<RawPlace, ExtractError> {
        let url = self.build_url(query);
        debug!(extractor = %self.name, %url, "Looking up place");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractError::Timeout
            } else if e.is_connect() {
                ExtractError::SessionClosed(e.to_string())
            } else {
                ExtractError::Navigation(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ExtractError::NotFound);
        }
        if !status.is_success() {
            return Err(ExtractError::Navigation(format!("HTTP {}", status)));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Parse(e.to_string()))?;

        let mut place = body.into_place();
        if place.url.is_none() {
            place.url = Some(url);
        }
        if !place.is_found() {
            return Err(ExtractError::NotFound);
        }
        Ok(place)
    }
}

/// Opens one [`HttpExtractor`] per worker.
pub struct HttpExtractorFactory {
    config: ExtractorConfig,
}

impl HttpExtractorFactory {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ExtractorFactory for HttpExtractorFactory {
    async fn open_session(&self, worker_id: usize) -> Result<Box<dyn Extractor>, ExtractError> {
        let extractor = HttpExtractor::new(self.config.clone(), worker_id)?;
        Ok(Box::new(extractor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(base_url: &str) -> ExtractorConfig {
        ExtractorConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    /// Serve a single canned HTTP response and return the lookup URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}/lookup", addr)
    }

    async fn extract_from(status: &'static str, body: &'static str) -> Result<RawPlace, ExtractError> {
        let url = serve_once(status, body).await;
        let extractor = HttpExtractor::new(config(&url), 0).unwrap();
        extractor.extract("\"Joe's Pizza\" 123 Bleecker St").await
    }

    #[tokio::test]
    async fn test_extract_found_place() {
        let place = extract_from("200 OK", r#"{"name": "Joe's Pizza", "address": "123 Bleecker St", "rating": 4.5}"#)
            .await
            .unwrap();
        assert_eq!(place.name.as_deref(), Some("Joe's Pizza"));
        assert_eq!(place.rating, Some(4.5));
        assert!(place.url.as_deref().unwrap().contains("q=%22Joe%27s%20Pizza%22"));
    }

    #[tokio::test]
    async fn test_extract_rate_limited_is_navigation_error() {
        let err = extract_from("429 Too Many Requests", "{}").await.unwrap_err();
        assert!(matches!(err, ExtractError::Navigation(ref m) if m.contains("429")), "{:?}", err);
        assert!(!err.is_session_fatal());
    }

    #[tokio::test]
    async fn test_extract_server_error_is_navigation_error() {
        let err = extract_from("503 Service Unavailable", "").await.unwrap_err();
        assert!(matches!(err, ExtractError::Navigation(ref m) if m.contains("503")), "{:?}", err);
    }

    #[tokio::test]
    async fn test_extract_missing_place_is_not_found() {
        let err = extract_from("404 Not Found", "").await.unwrap_err();
        assert!(matches!(err, ExtractError::NotFound), "{:?}", err);
    }

    #[tokio::test]
    async fn test_extract_empty_name_is_not_found() {
        let err = extract_from("200 OK", r#"{"name": ""}"#).await.unwrap_err();
        assert!(matches!(err, ExtractError::NotFound), "{:?}", err);
    }

    #[tokio::test]
    async fn test_extract_invalid_body_is_parse_error() {
        let err = extract_from("200 OK", "<html>captcha</html>").await.unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)), "{:?}", err);
    }

    #[test]
    fn test_build_url_encodes_query() {
        let extractor = HttpExtractor::new(config("http://localhost:8900/lookup/"), 0).unwrap();
        let url = extractor.build_url("\"Joe's Pizza\" 123 Bleecker St Manhattan NYC");
        assert_eq!(
            url,
            "http://localhost:8900/lookup?q=%22Joe%27s%20Pizza%22%20123%20Bleecker%20St%20Manhattan%20NYC"
        );
    }

    #[test]
    fn test_response_into_place_cleans_fields() {
        let json = r#"{
            "name": "  Joe's Pizza ",
            "address": "123 Bleecker St\nNew York, NY 10012",
            "category": "Pizza restaurant",
            "rating": "4.5 stars",
            "reviews": "(1,234)"
        }"#;
        let response: LookupResponse = serde_json::from_str(json).unwrap();
        let place = response.into_place();

        assert_eq!(place.name.as_deref(), Some("Joe's Pizza"));
        assert_eq!(place.address.as_deref(), Some("123 Bleecker St, New York, NY 10012"));
        assert_eq!(place.category.as_deref(), Some("Pizza restaurant"));
        assert_eq!(place.rating, Some(4.5));
        assert_eq!(place.review_count, Some(1234));
    }

    #[test]
    fn test_response_numeric_fields() {
        let json = r#"{"name": "Cafe", "rating": 4.1, "review_count": 87}"#;
        let response: LookupResponse = serde_json::from_str(json).unwrap();
        let place = response.into_place();
        assert_eq!(place.rating, Some(4.1));
        assert_eq!(place.review_count, Some(87));
        assert!(place.category.is_none());
    }

    #[test]
    fn test_extractor_name() {
        let extractor = HttpExtractor::new(config("http://localhost:1"), 3).unwrap();
        assert_eq!(extractor.name(), "http-3");
    }

    #[tokio::test]
    async fn test_connection_refused_is_session_fatal() {
        // Port 1 on localhost is never served in test environments.
        let extractor = HttpExtractor::new(config("http://127.0.0.1:1/lookup"), 0).unwrap();
        let err = extractor.extract("anything").await.unwrap_err();
        assert!(err.is_session_fatal(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_factory_opens_sessions() {
        let factory = HttpExtractorFactory::new(config("http://localhost:8900/lookup"));
        let session = factory.open_session(2).await.unwrap();
        assert_eq!(session.name(), "http-2");
    }
}
