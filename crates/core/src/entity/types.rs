//! Entity and task types.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Separator used when joining name and address into an identity key.
pub const KEY_SEPARATOR: &str = "|";

/// A restaurant record to resolve against the lookup source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub category: String,
    /// Borough or other locality hint appended to the search query.
    #[serde(default, rename = "boro")]
    pub region: String,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        category: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            category: category.into(),
            region: region.into(),
        }
    }

    /// Identity key used for dedup and checkpointing.
    ///
    /// Case-sensitive, exact concatenation of name and address.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.name, KEY_SEPARATOR, self.address)
    }
}

/// An entity wrapped for processing.
///
/// Equality and hashing only look at the identity key.
#[derive(Debug, Clone)]
pub struct Task {
    key: String,
    entity: Entity,
}

impl Task {
    pub fn new(entity: Entity) -> Self {
        Self {
            key: entity.key(),
            entity,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn into_entity(self) -> Entity {
        self.entity
    }
}

impl From<Entity> for Task {
    fn from(entity: Entity) -> Self {
        Task::new(entity)
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
