//! Confidence scoring of extracted places against the input entity.
//!
//! Similarity is computed for names and for normalized addresses, then a
//! [`ConfidenceRule`] decides whether the match is confident. Rules are
//! configuration: the `parallel` rule accepts a weaker name match when the
//! address agrees, the `single_stream` rule looks at the name alone.

mod address;
mod similarity;

pub use address::normalize_address;
pub use similarity::{gestalt_ratio, SimilarityMetric};

use serde::{Deserialize, Serialize};

use crate::outcome::MatchVerdict;

/// Threshold rule deciding whether a match is confident.
///
/// Confident when `name > name_threshold`, or when an address branch is
/// configured and `name > min_name && address > min_address`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRule {
    pub name_threshold: f64,
    #[serde(default)]
    pub address_branch: Option<AddressBranch>,
}

/// Secondary branch of a [`ConfidenceRule`] that uses the address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AddressBranch {
    pub min_name: f64,
    pub min_address: f64,
}

impl ConfidenceRule {
    /// `name > 0.9 || (name > 0.5 && address > 0.8)`.
    pub fn parallel() -> Self {
        Self {
            name_threshold: 0.9,
            address_branch: Some(AddressBranch {
                min_name: 0.5,
                min_address: 0.8,
            }),
        }
    }

    /// `name > 0.7`.
    pub fn single_stream() -> Self {
        Self {
            name_threshold: 0.7,
            address_branch: None,
        }
    }

    /// Apply the rule. A missing address must be passed as 0.
    pub fn is_confident(&self, name_sim: f64, address_sim: f64) -> bool {
        name_sim > self.name_threshold
            || self
                .address_branch
                .is_some_and(|b| name_sim > b.min_name && address_sim > b.min_address)
    }
}

/// Named confidence rule selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Parallel,
    SingleStream,
    Custom,
}

/// Scorer configuration.
///
/// ```toml
/// [scorer]
/// metric = "gestalt"
/// rule = "custom"
/// name_threshold = 0.85
/// address_min_name = 0.5
/// address_min_address = 0.8
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    #[serde(default)]
    pub metric: SimilarityMetric,
    /// Unset means "use the run profile's rule".
    #[serde(default)]
    pub rule: Option<RuleKind>,
    /// Name threshold for the `custom` rule.
    #[serde(default)]
    pub name_threshold: Option<f64>,
    /// Address branch of the `custom` rule; both values must be set.
    #[serde(default)]
    pub address_min_name: Option<f64>,
    #[serde(default)]
    pub address_min_address: Option<f64>,
}

impl ScorerConfig {
    /// Resolve the configured rule, falling back to `default` when unset.
    pub fn resolve_rule(&self, default: ConfidenceRule) -> Result<ConfidenceRule, String> {
        match self.rule {
            None => Ok(default),
            Some(RuleKind::Parallel) => Ok(ConfidenceRule::parallel()),
            Some(RuleKind::SingleStream) => Ok(ConfidenceRule::single_stream()),
            Some(RuleKind::Custom) => {
                let name_threshold = self
                    .name_threshold
                    .ok_or("scorer.name_threshold is required for the custom rule")?;
                let address_branch = match (self.address_min_name, self.address_min_address) {
                    (Some(min_name), Some(min_address)) => Some(AddressBranch {
                        min_name,
                        min_address,
                    }),
                    (None, None) => None,
                    _ => {
                        return Err("scorer.address_min_name and scorer.address_min_address \
                                    must be set together"
                            .to_string())
                    }
                };
                let rule = ConfidenceRule {
                    name_threshold,
                    address_branch,
                };
                let values = [Some(name_threshold), self.address_min_name, self.address_min_address];
                if values.iter().flatten().any(|v| !(0.0..=1.0).contains(v)) {
                    return Err("scorer thresholds must be within 0.0..=1.0".to_string());
                }
                Ok(rule)
            }
        }
    }

    pub fn build(&self, default: ConfidenceRule) -> Result<ConfidenceScorer, String> {
        Ok(ConfidenceScorer::new(self.metric, self.resolve_rule(default)?))
    }
}

/// Pure scorer comparing an entity with an extracted place.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    metric: SimilarityMetric,
    rule: ConfidenceRule,
}

impl ConfidenceScorer {
    pub fn new(metric: SimilarityMetric, rule: ConfidenceRule) -> Self {
        Self { metric, rule }
    }

    pub fn rule(&self) -> &ConfidenceRule {
        &self.rule
    }

    pub fn name_similarity(&self, original: &str, extracted: &str) -> f64 {
        self.metric.similarity(original, extracted)
    }

    pub fn address_similarity(&self, original: &str, extracted: &str) -> f64 {
        self.metric
            .similarity(&normalize_address(original), &normalize_address(extracted))
    }

    /// Score an extracted name/address against the entity's.
    ///
    /// Scores in the verdict are rounded to two decimals; the confidence
    /// decision uses the unrounded values.
    pub fn score(
        &self,
        original_name: &str,
        original_address: &str,
        extracted_name: &str,
        extracted_address: Option<&str>,
    ) -> MatchVerdict {
        let name_sim = self.name_similarity(original_name, extracted_name);
        let address_sim = match extracted_address {
            Some(extracted) if !extracted.is_empty() && !original_address.is_empty() => {
                Some(self.address_similarity(original_address, extracted))
            }
            _ => None,
        };

        MatchVerdict {
            name_similarity: round2(name_sim),
            address_similarity: address_sim.map(round2),
            confident: self.rule.is_confident(name_sim, address_sim.unwrap_or(0.0)),
        }
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(SimilarityMetric::default(), ConfidenceRule::parallel())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
