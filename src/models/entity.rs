use serde::{Deserialize, Serialize};

/// Kind of a known entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntityType {
    Player,
    Coach,
    Team,
    Staff,
}

/// Externally seeded reference entity (players, coaches, teams, staff).
///
/// Read-only from this core's perspective except for the act of
/// associating one with a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    /// Full name, e.g. "Macklin Celebrini"
    pub name: String,
    /// URL-friendly slug, e.g. "macklin-celebrini"
    pub slug: String,
    pub entity_type: EntityType,
    /// Alternate spellings and dictionary-known nicknames
    pub aliases: Vec<String>,
}

impl Entity {
    pub fn new(id: i64, name: &str, entity_type: EntityType) -> Self {
        Self {
            id,
            name: name.to_string(),
            slug: make_slug(name),
            entity_type,
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn is_team(&self) -> bool {
        self.entity_type == EntityType::Team
    }
}

/// Convert a display name to a URL-friendly slug.
pub fn make_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}
