//! Per-task extraction outcomes and match verdicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, KEY_SEPARATOR};
use crate::extractor::RawPlace;

/// Derived confidence judgment for a found place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub name_similarity: f64,
    /// Only present when both addresses were available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_similarity: Option<f64>,
    #[serde(rename = "confident_match")]
    pub confident: bool,
}

/// Result of attempting one task.
///
/// Field names follow the checkpoint format consumed by the merge stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub original_name: String,
    pub original_address: String,
    pub original_category: String,
    #[serde(rename = "original_boro")]
    pub original_region: String,
    pub search_query: String,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub scraped_at: DateTime<Utc>,
    pub found: bool,
    #[serde(rename = "google_name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "google_address", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "google_category", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "google_rating", default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(rename = "google_reviews", default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,
    #[serde(rename = "google_url", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub verdict: Option<MatchVerdict>,
}

impl ExtractionOutcome {
    fn base(entity: &Entity, query: &str, found: bool) -> Self {
        Self {
            original_name: entity.name.clone(),
            original_address: entity.address.clone(),
            original_category: entity.category.clone(),
            original_region: entity.region.clone(),
            search_query: query.to_string(),
            scraped_at: Utc::now(),
            found,
            name: None,
            address: None,
            category: None,
            rating: None,
            review_count: None,
            url: None,
            error: None,
            verdict: None,
        }
    }

    /// Outcome for a place that was found. The verdict is attached later.
    pub fn found(entity: &Entity, query: &str, place: RawPlace) -> Self {
        Self {
            name: place.name,
            address: place.address,
            category: place.category,
            rating: place.rating,
            review_count: place.review_count,
            url: place.url,
            ..Self::base(entity, query, true)
        }
    }

    /// Outcome for a failed attempt.
    pub fn failed(entity: &Entity, query: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(entity, query, false)
        }
    }

    /// Identity key of the entity this outcome belongs to.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.original_name, KEY_SEPARATOR, self.original_address)
    }

    pub fn is_confident(&self) -> bool {
        self.verdict.as_ref().is_some_and(|v| v.confident)
    }
}
