use serde::{Deserialize, Serialize};

use super::entity::make_slug;

/// Externally seeded story tag (News, Rumors, Injury, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    /// Display name, e.g. "Rumors"
    pub name: String,
    /// URL-friendly slug, e.g. "rumors"
    pub slug: String,
    /// Hex color code for display
    pub color: Option<String>,
}

impl Tag {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            slug: make_slug(name),
            color: None,
        }
    }
}
