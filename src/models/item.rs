use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Ordinal authority rank of a source. Official outranks press, press
/// outranks everything else. Used for headline precedence.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceRank {
    Other = 1,
    Press = 2,
    Official = 3,
}

/// One raw piece of content from one source, as delivered by the
/// ingestion collaborator. Immutable once created; this core never
/// mutates an Item.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Item {
    /// Unique item identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Source that delivered this item
    pub source_id: i64,

    /// Source display name
    #[validate(length(min = 1, max = 255))]
    pub source_name: String,

    /// Authority rank copied from the source
    pub source_rank: SourceRank,

    /// Raw title text (may be empty; empty text degrades, never errors)
    pub title: String,

    /// Raw description text
    pub description: String,

    /// Canonical link-out URL
    #[validate(length(min = 1))]
    pub url: String,

    /// Original publication timestamp
    pub published_at: DateTime<Utc>,

    /// Timestamp when this core received the item
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,

    /// Sources dedicated to the covered beat bypass the relevance gate
    #[serde(default)]
    pub skip_relevance_check: bool,
}

impl Item {
    pub fn new(
        source_id: i64,
        source_name: String,
        source_rank: SourceRank,
        title: String,
        description: String,
        url: String,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            source_name,
            source_rank,
            title,
            description,
            url,
            published_at,
            received_at: Utc::now(),
            skip_relevance_check: false,
        }
    }

    /// Combined text used for enrichment
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}
