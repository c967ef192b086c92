use crate::error::{AppError, Result};
use crate::models::{Cluster, Variant, VariantLink};
use crate::state::{sort_member_links, ClusterFilter, ClusterStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// In-memory cluster store (for single-node deployments and testing).
///
/// Creation races are serialized through the matching-key index: the
/// dashmap entry API admits exactly one writer per key, so a losing
/// concurrent creator observes `DuplicateEventKey` and re-matches.
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    clusters: Arc<DashMap<Uuid, Cluster>>,
    links: Arc<DashMap<Uuid, Vec<VariantLink>>>,
    key_index: Arc<DashMap<String, Uuid>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            clusters: Arc::new(DashMap::new()),
            links: Arc::new(DashMap::new()),
            key_index: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterStore for InMemoryStore {
    async fn create_cluster(
        &self,
        variant: &Variant,
        matching_key: &str,
        tag_slugs: &BTreeSet<String>,
        fresh_after: DateTime<Utc>,
    ) -> Result<Cluster> {
        let mut cluster = Cluster::from_variant(variant, matching_key.to_string());
        cluster.merge_tags(tag_slugs);

        // The key-index entry guard stays held until the cluster row is
        // visible, so a racing creator for the same key either sees
        // DuplicateEventKey or the committed cluster, never neither.
        match self.key_index.entry(matching_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                // A key may point at a cluster that was since purged,
                // archived, or last seen before the caller's window;
                // such entries are superseded instead of blocking
                // creation forever.
                let holder_blocks = self
                    .clusters
                    .get(occupied.get())
                    .map(|c| c.is_active() && c.last_seen_at >= fresh_after)
                    .unwrap_or(false);
                if holder_blocks {
                    return Err(AppError::DuplicateEventKey {
                        key: matching_key.to_string(),
                    });
                }
                let link = VariantLink::new(cluster.id, variant.clone(), 1.0);
                self.links.insert(cluster.id, vec![link]);
                self.clusters.insert(cluster.id, cluster.clone());
                occupied.insert(cluster.id);
            }
            Entry::Vacant(vacant) => {
                let link = VariantLink::new(cluster.id, variant.clone(), 1.0);
                self.links.insert(cluster.id, vec![link]);
                self.clusters.insert(cluster.id, cluster.clone());
                vacant.insert(cluster.id);
            }
        }

        tracing::debug!(
            cluster_id = %cluster.id,
            matching_key = %matching_key,
            "Cluster created"
        );
        Ok(cluster)
    }

    async fn attach_variant(
        &self,
        cluster_id: &Uuid,
        variant: &Variant,
        score: f64,
        tag_slugs: &BTreeSet<String>,
    ) -> Result<Cluster> {
        // Lock order is cluster row, then link rows; all writers agree.
        let mut cluster = self.clusters.get_mut(cluster_id).ok_or_else(|| {
            AppError::NotFound(format!("Cluster {} not found", cluster_id))
        })?;

        let mut links = self.links.entry(*cluster_id).or_default();
        links.push(VariantLink::new(*cluster_id, variant.clone(), score));

        let distinct_sources: HashSet<i64> =
            links.iter().map(|link| link.variant.source_id).collect();

        cluster.absorb(variant);
        cluster.merge_tags(tag_slugs);
        cluster.source_count = distinct_sources.len() as u32;

        tracing::debug!(
            cluster_id = %cluster_id,
            variant_id = %variant.id,
            score = score,
            source_count = cluster.source_count,
            "Variant attached to cluster"
        );
        Ok(cluster.clone())
    }

    async fn get_cluster(&self, id: &Uuid) -> Result<Option<Cluster>> {
        Ok(self.clusters.get(id).map(|entry| entry.clone()))
    }

    async fn find_by_matching_key(&self, matching_key: &str) -> Result<Option<Cluster>> {
        let holder_id = match self.key_index.get(matching_key) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        Ok(self.clusters.get(&holder_id).map(|entry| entry.clone()))
    }

    async fn find_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Cluster>> {
        Ok(self
            .clusters
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|cluster| cluster.is_active() && cluster.last_seen_at >= cutoff)
            .collect())
    }

    async fn list_clusters(
        &self,
        filter: &ClusterFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Cluster>> {
        let mut clusters: Vec<Cluster> = self
            .clusters
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|cluster| filter.matches(cluster))
            .collect();

        // Most recently updated first
        clusters.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));

        let start = (page * page_size) as usize;
        Ok(clusters
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect())
    }

    async fn count_clusters(&self, filter: &ClusterFilter) -> Result<u64> {
        let count = self
            .clusters
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count();
        Ok(count as u64)
    }

    async fn cluster_variants(&self, cluster_id: &Uuid) -> Result<Vec<VariantLink>> {
        let mut links = self
            .links
            .get(cluster_id)
            .map(|entry| entry.clone())
            .unwrap_or_default();
        sort_member_links(&mut links);
        Ok(links)
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let stale: Vec<(Uuid, String)> = self
            .clusters
            .iter()
            .filter(|entry| entry.value().is_stale(cutoff))
            .map(|entry| (entry.value().id, entry.value().matching_key.clone()))
            .collect();

        for (id, key) in &stale {
            self.clusters.remove(id);
            self.links.remove(id);
            // Only release the key if it still points at the purged
            // cluster; it may already have been reclaimed.
            self.key_index
                .remove_if(key, |_, holder| holder == id);
        }

        if !stale.is_empty() {
            tracing::info!(purged = stale.len(), "Purged stale clusters");
        }
        Ok(stale.len() as u64)
    }
}
