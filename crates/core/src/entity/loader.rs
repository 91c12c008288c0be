//! Loading the entity catalog from disk.

use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::Entity;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse input: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    restaurants: Vec<Entity>,
}

/// Parse a catalog document of the form `{"restaurants": [...]}`.
pub fn parse_entities(json: &str) -> Result<Vec<Entity>, EntityError> {
    let catalog: Catalog =
        serde_json::from_str(json).map_err(|e| EntityError::Parse(e.to_string()))?;
    Ok(catalog.restaurants)
}

/// Load the entity catalog from a JSON file.
pub async fn load_entities(path: &Path) -> Result<Vec<Entity>, EntityError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(EntityError::FileNotFound(path.display().to_string()));
    }
    let raw = tokio::fs::read_to_string(path).await?;
    parse_entities(&raw)
}

/// Stable fingerprint of an entity list, recorded in checkpoints so a resume
/// against a different input can be detected.
pub fn fingerprint(entities: &[Entity]) -> String {
    let mut hasher = Sha256::new();
    for entity in entities {
        hasher.update(entity.key().as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())[..16].to_string()
}
