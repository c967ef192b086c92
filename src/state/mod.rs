pub mod factory;
pub mod sled_store;
pub mod store;

pub use factory::create_store;
pub use sled_store::SledClusterStore;
pub use store::InMemoryStore;

use crate::error::Result;
use crate::models::{Cluster, ClusterStatus, Variant, VariantLink};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Trait for cluster storage operations.
///
/// Implementations must serialize cluster creation per matching key:
/// `create_cluster` fails with `AppError::DuplicateEventKey` when an
/// active cluster seen since `fresh_after` already owns the key, and
/// `attach_variant` commits the aggregate update and the link row
/// together or not at all.
#[async_trait]
pub trait ClusterStore: Send + Sync + std::fmt::Debug {
    /// Create a new cluster seeded from a variant.
    ///
    /// `fresh_after` scopes key uniqueness to the caller's candidate
    /// window: a key held by a cluster not seen since then is
    /// superseded rather than blocking creation, since new coverage
    /// past the window is a new story.
    async fn create_cluster(
        &self,
        variant: &Variant,
        matching_key: &str,
        tag_slugs: &BTreeSet<String>,
        fresh_after: DateTime<Utc>,
    ) -> Result<Cluster>;

    /// Attach a variant to an existing cluster, updating aggregates,
    /// recounting distinct sources, and applying headline precedence.
    async fn attach_variant(
        &self,
        cluster_id: &Uuid,
        variant: &Variant,
        score: f64,
        tag_slugs: &BTreeSet<String>,
    ) -> Result<Cluster>;

    /// Get a cluster by ID.
    async fn get_cluster(&self, id: &Uuid) -> Result<Option<Cluster>>;

    /// Current holder of a matching key, if any. Used by the pipeline
    /// to merge into the winner after a lost create race.
    async fn find_by_matching_key(&self, matching_key: &str) -> Result<Option<Cluster>>;

    /// Active clusters with `last_seen_at` at or after the cutoff. The
    /// matcher applies the per-event-type window on top of this scan.
    async fn find_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Cluster>>;

    /// List clusters with filtering, ordered by `last_seen_at`
    /// descending, paginated.
    async fn list_clusters(
        &self,
        filter: &ClusterFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Cluster>>;

    /// Count clusters matching a filter.
    async fn count_clusters(&self, filter: &ClusterFilter) -> Result<u64>;

    /// Member variants of a cluster, ordered by source rank descending
    /// then published time descending.
    async fn cluster_variants(&self, cluster_id: &Uuid) -> Result<Vec<VariantLink>>;

    /// Remove clusters stale past the cutoff along with their link rows
    /// and tag/entity associations. Idempotent; never touches Items.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// Filter for querying clusters.
#[derive(Debug, Clone, Default)]
pub struct ClusterFilter {
    pub statuses: Vec<ClusterStatus>,
    pub tag_slugs: Vec<String>,
    pub entity_ids: Vec<i64>,
    pub since: Option<DateTime<Utc>>,
}

impl ClusterFilter {
    /// Filter for the default feed: active clusters only.
    pub fn active() -> Self {
        Self {
            statuses: vec![ClusterStatus::Active],
            ..Default::default()
        }
    }

    pub fn matches(&self, cluster: &Cluster) -> bool {
        let status_match = self.statuses.is_empty() || self.statuses.contains(&cluster.status);

        let tag_match = self.tag_slugs.is_empty()
            || self.tag_slugs.iter().any(|slug| cluster.tag_slugs.contains(slug));

        let entity_match = self.entity_ids.is_empty()
            || self.entity_ids.iter().any(|id| cluster.entities.contains(id));

        let time_match = self.since.map_or(true, |since| cluster.last_seen_at >= since);

        status_match && tag_match && entity_match && time_match
    }
}

/// Order member links by source rank descending, then published time
/// descending. Shared by both store backends.
pub(crate) fn sort_member_links(links: &mut [VariantLink]) {
    links.sort_by(|a, b| {
        b.variant
            .source_rank
            .cmp(&a.variant.source_rank)
            .then(b.variant.published_at.cmp(&a.variant.published_at))
    });
}
