use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::cluster::EventType;
use super::item::{Item, SourceRank};

/// The enriched, per-source representation of an Item used for matching.
///
/// Created exactly once per Item and never mutated afterwards. After
/// matching it belongs to exactly one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Unique variant identifier
    pub id: Uuid,

    /// Item this variant was enriched from
    pub item_id: Uuid,

    /// Source that delivered the underlying item
    pub source_id: i64,

    /// Source display name
    pub source_name: String,

    /// Authority rank copied from the source
    pub source_rank: SourceRank,

    /// Title text
    pub title: String,

    /// Canonical link-out URL
    pub url: String,

    /// Original publication timestamp
    pub published_at: DateTime<Utc>,

    /// Normalized tokens for clustering
    pub tokens: BTreeSet<String>,

    /// Entity IDs found in the text
    pub entities: BTreeSet<i64>,

    /// Classified event type
    pub event_type: EventType,
}

impl Variant {
    /// Build a variant from an item plus its enrichment outputs.
    pub fn from_item(
        item: &Item,
        tokens: BTreeSet<String>,
        entities: BTreeSet<i64>,
        event_type: EventType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id: item.id,
            source_id: item.source_id,
            source_name: item.source_name.clone(),
            source_rank: item.source_rank,
            title: item.title.clone(),
            url: item.url.clone(),
            published_at: item.published_at,
            tokens,
            entities,
            event_type,
        }
    }

    /// Entity IDs with team entities removed.
    ///
    /// Team entities appear in almost every article about the covered
    /// beat and would collapse unrelated stories into one cluster, so
    /// they are excluded from matching.
    pub fn non_team_entities(&self, team_ids: &BTreeSet<i64>) -> BTreeSet<i64> {
        self.entities
            .iter()
            .copied()
            .filter(|id| !team_ids.contains(id))
            .collect()
    }

    /// Key that serializes cluster-creation decisions which could collide.
    ///
    /// Derived from the dominant (lowest-id) non-team entity plus the
    /// event type. When no non-team entity matched, falls back to a
    /// digest of the sorted token set so textual near-duplicates still
    /// share a key.
    pub fn matching_key(&self, team_ids: &BTreeSet<i64>) -> String {
        if let Some(id) = self.entities.iter().find(|id| !team_ids.contains(id)) {
            return format!("{}:{}", self.event_type, id);
        }

        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        for token in &self.tokens {
            hasher.update(token.as_bytes());
            hasher.update(b"\x1f");
        }
        format!("{}:{:x}", self.event_type, hasher.finalize())
    }
}
