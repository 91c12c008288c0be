//! Extraction capability: turns a search query into place fields.
//!
//! The orchestrator only depends on the [`Extractor`] contract. Each worker
//! owns one session obtained from an [`ExtractorFactory`], so sessions never
//! need cross-worker coordination.

pub mod fields;
mod http;
mod traits;
mod types;

pub use http::{HttpExtractor, HttpExtractorFactory};
pub use traits::{Extractor, ExtractorFactory};
pub use types::{ExtractError, RawPlace};
