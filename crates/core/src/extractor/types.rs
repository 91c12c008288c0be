//! Types for the extraction capability.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fields read from the lookup source for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPlace {
    pub name: Option<String>,
    pub address: Option<String>,
    pub category: Option<String>,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub url: Option<String>,
}

impl RawPlace {
    /// A place counts as found when it has a name.
    pub fn is_found(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

/// Errors reported by an extraction session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractError {
    #[error("timeout")]
    Timeout,

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("no name found")]
    NotFound,

    #[error("invalid response: {0}")]
    Parse(String),

    /// The session can no longer be used; the owning worker must stop.
    #[error("session closed: {0}")]
    SessionClosed(String),
}

impl ExtractError {
    /// Whether this error ends the worker that owns the session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ExtractError::SessionClosed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_found_requires_non_blank_name() {
        assert!(!RawPlace::default().is_found());
        let blank = RawPlace {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!blank.is_found());
        let named = RawPlace {
            name: Some("Joe's Pizza".to_string()),
            ..Default::default()
        };
        assert!(named.is_found());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ExtractError::Timeout.to_string(), "timeout");
        assert_eq!(ExtractError::NotFound.to_string(), "no name found");
        assert_eq!(
            ExtractError::Navigation("HTTP 503".to_string()).to_string(),
            "navigation failed: HTTP 503"
        );
    }

    #[test]
    fn test_only_session_closed_is_fatal() {
        assert!(ExtractError::SessionClosed("gone".into()).is_session_fatal());
        assert!(!ExtractError::Timeout.is_session_fatal());
        assert!(!ExtractError::Navigation("x".into()).is_session_fatal());
        assert!(!ExtractError::NotFound.is_session_fatal());
    }
}
