use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::models::{Entity, Tag};

/// Access to externally seeded reference data: the entity dictionary
/// and the tag table.
///
/// Both may be updated at any time between calls; implementations must
/// return the current version on every call and never cache
/// indefinitely on the core's behalf.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    /// Current entity dictionary.
    async fn entities(&self) -> Result<Vec<Entity>>;

    /// Current tag table.
    async fn tags(&self) -> Result<Vec<Tag>>;

    /// IDs of team-type entities, excluded from matching aggregates.
    async fn team_entity_ids(&self) -> Result<BTreeSet<i64>> {
        Ok(self
            .entities()
            .await?
            .into_iter()
            .filter(|e| e.is_team())
            .map(|e| e.id)
            .collect())
    }
}

/// Reference data held in memory and replaced wholesale by an external
/// seeding process.
pub struct InMemoryReference {
    entities: RwLock<Vec<Entity>>,
    tags: RwLock<Vec<Tag>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(Vec::new()),
            tags: RwLock::new(Vec::new()),
        }
    }

    pub fn seeded(entities: Vec<Entity>, tags: Vec<Tag>) -> Self {
        Self {
            entities: RwLock::new(entities),
            tags: RwLock::new(tags),
        }
    }

    /// Replace the entity dictionary (external seeding hook).
    pub fn replace_entities(&self, entities: Vec<Entity>) {
        *self.entities.write() = entities;
    }

    /// Replace the tag table (external seeding hook).
    pub fn replace_tags(&self, tags: Vec<Tag>) {
        *self.tags.write() = tags;
    }
}

impl Default for InMemoryReference {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferenceData for InMemoryReference {
    async fn entities(&self) -> Result<Vec<Entity>> {
        Ok(self.entities.read().clone())
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        Ok(self.tags.read().clone())
    }
}
