use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::item::SourceRank;
use super::variant::Variant;

/// Closed-set event classification for news items and clusters.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventType {
    Trade,
    Injury,
    Lineup,
    Recall,
    Waiver,
    Signing,
    Prospect,
    Game,
    Opinion,
    Other,
}

/// Cluster lifecycle status.
///
/// `Merged` is reserved for manual consolidation tooling and is never
/// produced by the automatic pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClusterStatus {
    Active,
    Archived,
    Merged,
}

/// One real-world event, aggregating one or more variants.
///
/// The feed displays clusters, not individual variants. Aggregated token
/// and entity sets only ever grow, and `last_seen_at` never decreases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Unique cluster identifier
    pub id: Uuid,

    /// Canonical headline for this cluster
    pub headline: String,

    /// Rank of the source that produced the current headline
    pub headline_source_rank: SourceRank,

    /// Publication time of the variant backing the current headline
    pub headline_published_at: DateTime<Utc>,

    /// Event classification
    pub event_type: EventType,

    /// Lifecycle status
    pub status: ClusterStatus,

    /// Timestamp of the first member variant
    pub first_seen_at: DateTime<Utc>,

    /// Timestamp of the most recent member variant
    pub last_seen_at: DateTime<Utc>,

    /// Aggregated normalized tokens (union over members)
    pub tokens: BTreeSet<String>,

    /// Aggregated entity IDs (union over members)
    pub entities: BTreeSet<i64>,

    /// Number of distinct sources among attached variants
    pub source_count: u32,

    /// Key that serializes racing creation decisions
    pub matching_key: String,

    /// Slugs of tags associated with this cluster
    pub tag_slugs: BTreeSet<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cluster {
    /// Seed a new cluster from its first variant.
    pub fn from_variant(variant: &Variant, matching_key: String) -> Self {
        let now = Utc::now();
        let headline = if variant.title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            variant.title.clone()
        };

        Self {
            id: Uuid::new_v4(),
            headline,
            headline_source_rank: variant.source_rank,
            headline_published_at: variant.published_at,
            event_type: variant.event_type,
            status: ClusterStatus::Active,
            first_seen_at: variant.published_at,
            last_seen_at: variant.published_at,
            tokens: variant.tokens.clone(),
            entities: variant.entities.clone(),
            source_count: 1,
            matching_key,
            tag_slugs: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a variant into the aggregates.
    ///
    /// Token/entity unions are monotonic and `last_seen_at` never moves
    /// backwards. The headline is replaced only when the variant's source
    /// outranks the current headline source, or ties it with a more recent
    /// publication time. Does not touch `source_count`; the store recounts
    /// distinct sources from the link rows.
    pub fn absorb(&mut self, variant: &Variant) {
        self.tokens.extend(variant.tokens.iter().cloned());
        self.entities.extend(variant.entities.iter().copied());

        if variant.published_at > self.last_seen_at {
            self.last_seen_at = variant.published_at;
        }

        let replaces_headline = variant.source_rank > self.headline_source_rank
            || (variant.source_rank == self.headline_source_rank
                && variant.published_at > self.headline_published_at);

        if replaces_headline && !variant.title.trim().is_empty() {
            self.headline = variant.title.clone();
            self.headline_source_rank = variant.source_rank;
            self.headline_published_at = variant.published_at;
        }

        self.updated_at = Utc::now();
    }

    /// Associate derived tag slugs with this cluster.
    pub fn merge_tags(&mut self, slugs: &BTreeSet<String>) {
        self.tag_slugs.extend(slugs.iter().cloned());
    }

    pub fn is_active(&self) -> bool {
        self.status == ClusterStatus::Active
    }

    /// Stale clusters are retention-sweeper fodder.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_seen_at < cutoff
    }
}

/// Link row between a cluster and one of its member variants.
///
/// Retains the similarity score computed at attach time for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantLink {
    pub cluster_id: Uuid,
    pub variant: Variant,
    pub similarity_score: f64,
    pub added_at: DateTime<Utc>,
}

impl VariantLink {
    pub fn new(cluster_id: Uuid, variant: Variant, similarity_score: f64) -> Self {
        Self {
            cluster_id,
            variant,
            similarity_score,
            added_at: Utc::now(),
        }
    }
}
