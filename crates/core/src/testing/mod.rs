//! Testing utilities and mock implementations.
//!
//! This module provides a mock extraction backend and fixtures, allowing
//! full orchestrator runs in tests without a lookup service.
//!
//! # Example
//!
//! ```rust,ignore
//! use placematch_core::testing::{fixtures, MockExtractorFactory, MockResponse};
//!
//! let factory = MockExtractorFactory::new();
//! factory.set_response("\"Closed Diner\"", MockResponse::Fail(ExtractError::NotFound)).await;
//!
//! let entities = fixtures::entities(20);
//! // Run the orchestrator with `factory`...
//! ```

mod mock_extractor;

pub use mock_extractor::{MockExtractor, MockExtractorFactory, MockResponse, RecordedQuery};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use crate::entity::Entity;
    use crate::extractor::RawPlace;
    use crate::orchestrator::RunSettings;

    /// Create a test entity with reasonable defaults.
    pub fn entity(name: &str, address: &str) -> Entity {
        Entity::new(name, address, "American", "Manhattan")
    }

    /// Create `count` distinct entities.
    pub fn entities(count: usize) -> Vec<Entity> {
        (0..count)
            .map(|i| entity(&format!("Restaurant {}", i), &format!("{} Broadway", i + 1)))
            .collect()
    }

    /// Create a found place.
    pub fn place(name: &str, address: &str) -> RawPlace {
        RawPlace {
            name: Some(name.to_string()),
            address: Some(address.to_string()),
            category: Some("Restaurant".to_string()),
            rating: Some(4.5),
            review_count: Some(120),
            url: Some(format!(
                "https://maps.example/place/{}",
                name.to_lowercase().replace(' ', "+")
            )),
        }
    }

    /// Write an entity list file in the input format and return its path.
    pub fn write_entity_file(dir: &Path, entities: &[Entity]) -> PathBuf {
        let path = dir.join("restaurants.json");
        let body = serde_json::json!({ "restaurants": entities });
        std::fs::write(&path, serde_json::to_vec_pretty(&body).unwrap()).unwrap();
        path
    }

    /// Run settings with no pacing delays and short loop intervals.
    pub fn fast_settings(workers: usize) -> RunSettings {
        let mut settings = RunSettings {
            workers,
            ..RunSettings::default()
        };
        settings.pacing.min_delay = Duration::ZERO;
        settings.pacing.max_delay = Duration::ZERO;
        settings.pacing.extract_timeout = Duration::from_secs(5);
        settings.checkpoint_interval = Duration::from_millis(50);
        settings.status_interval = Duration::from_millis(50);
        settings
    }
}
