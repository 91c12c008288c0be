//! Input entities (restaurant records) and the tasks built from them.

mod loader;
mod types;

pub use loader::{fingerprint, load_entities, parse_entities, EntityError};
pub use types::{Entity, Task, KEY_SEPARATOR};
