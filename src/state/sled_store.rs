use crate::error::{AppError, Result};
use crate::models::{Cluster, Variant, VariantLink};
use crate::state::{sort_member_links, ClusterFilter, ClusterStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::Db;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Persistent cluster store using the Sled embedded database.
///
/// Three trees: `clusters` (id -> Cluster), `links` (cluster id ->
/// Vec<VariantLink>), and `matching_keys` (key -> cluster id). Create
/// and attach run as multi-tree transactions, so the aggregate update
/// and the link rows commit together, and the matching-key uniqueness
/// check is serializable with the cluster insert.
#[derive(Clone, Debug)]
pub struct SledClusterStore {
    db: Arc<Db>,
    clusters_tree: sled::Tree,
    links_tree: sled::Tree,
    keys_tree: sled::Tree,
}

impl SledClusterStore {
    /// Open (or create) a store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(&path)?;
        let clusters_tree = db.open_tree("clusters")?;
        let links_tree = db.open_tree("links")?;
        let keys_tree = db.open_tree("matching_keys")?;

        tracing::info!(path = ?path.as_ref(), "Initialized sled cluster store");

        Ok(Self {
            db: Arc::new(db),
            clusters_tree,
            links_tree,
            keys_tree,
        })
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(AppError::from)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(AppError::from)
    }

    fn cluster_key(id: &Uuid) -> Vec<u8> {
        id.as_bytes().to_vec()
    }

    fn unwrap_tx_err(err: TransactionError<AppError>) -> AppError {
        match err {
            TransactionError::Abort(app) => app,
            TransactionError::Storage(e) => AppError::from(e),
        }
    }

    /// Flush pending writes to disk.
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    fn scan_clusters(&self) -> Result<Vec<Cluster>> {
        let mut clusters = Vec::new();
        for entry in self.clusters_tree.iter() {
            let (_, bytes) = entry?;
            clusters.push(Self::deserialize::<Cluster>(&bytes)?);
        }
        Ok(clusters)
    }
}

#[async_trait]
impl ClusterStore for SledClusterStore {
    async fn create_cluster(
        &self,
        variant: &Variant,
        matching_key: &str,
        tag_slugs: &BTreeSet<String>,
        fresh_after: DateTime<Utc>,
    ) -> Result<Cluster> {
        let mut cluster = Cluster::from_variant(variant, matching_key.to_string());
        cluster.merge_tags(tag_slugs);

        let id_bytes = Self::cluster_key(&cluster.id);
        let cluster_bytes = Self::serialize(&cluster)?;
        let links = vec![VariantLink::new(cluster.id, variant.clone(), 1.0)];
        let links_bytes = Self::serialize(&links)?;
        let key_bytes = matching_key.as_bytes().to_vec();

        (&self.clusters_tree, &self.links_tree, &self.keys_tree)
            .transaction(|(clusters, links, keys)| {
                // Uniqueness check on the matching key, serialized with
                // the insert. Keys pointing at purged, archived, or
                // out-of-window clusters are superseded.
                if let Some(holder_id) = keys.get(key_bytes.as_slice())? {
                    if let Some(holder_bytes) = clusters.get(&holder_id)? {
                        let holder: Cluster = Self::deserialize(&holder_bytes)
                            .map_err(ConflictableTransactionError::Abort)?;
                        if holder.is_active() && holder.last_seen_at >= fresh_after {
                            return Err(ConflictableTransactionError::Abort(
                                AppError::DuplicateEventKey {
                                    key: String::from_utf8_lossy(&key_bytes).into_owned(),
                                },
                            ));
                        }
                    }
                }

                clusters.insert(id_bytes.as_slice(), cluster_bytes.as_slice())?;
                links.insert(id_bytes.as_slice(), links_bytes.as_slice())?;
                keys.insert(key_bytes.as_slice(), id_bytes.as_slice())?;
                Ok(())
            })
            .map_err(Self::unwrap_tx_err)?;

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
        let id_bytes = Self::cluster_key(cluster_id);

        let updated = (&self.clusters_tree, &self.links_tree)
            .transaction(|(clusters, links)| {
                let cluster_bytes = clusters.get(id_bytes.as_slice())?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(AppError::NotFound(format!(
                        "Cluster {} not found",
                        cluster_id
                    )))
                })?;
                let mut cluster: Cluster = Self::deserialize(&cluster_bytes)
                    .map_err(ConflictableTransactionError::Abort)?;

                let mut member_links: Vec<VariantLink> = match links.get(id_bytes.as_slice())? {
                    Some(bytes) => Self::deserialize(&bytes)
                        .map_err(ConflictableTransactionError::Abort)?,
                    None => Vec::new(),
                };
                member_links.push(VariantLink::new(*cluster_id, variant.clone(), score));

                let distinct_sources: HashSet<i64> = member_links
                    .iter()
                    .map(|link| link.variant.source_id)
                    .collect();

                cluster.absorb(variant);
                cluster.merge_tags(tag_slugs);
                cluster.source_count = distinct_sources.len() as u32;

                let cluster_bytes = Self::serialize(&cluster)
                    .map_err(ConflictableTransactionError::Abort)?;
                let links_bytes = Self::serialize(&member_links)
                    .map_err(ConflictableTransactionError::Abort)?;

                clusters.insert(id_bytes.as_slice(), cluster_bytes.as_slice())?;
                links.insert(id_bytes.as_slice(), links_bytes.as_slice())?;
                Ok(cluster)
            })
            .map_err(Self::unwrap_tx_err)?;

        tracing::debug!(
            cluster_id = %cluster_id,
            variant_id = %variant.id,
            score = score,
            source_count = updated.source_count,
            "Variant attached to cluster"
        );
        Ok(updated)
    }

    async fn get_cluster(&self, id: &Uuid) -> Result<Option<Cluster>> {
        match self.clusters_tree.get(Self::cluster_key(id))? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_matching_key(&self, matching_key: &str) -> Result<Option<Cluster>> {
        let holder_id = match self.keys_tree.get(matching_key.as_bytes())? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        match self.clusters_tree.get(&holder_id)? {
            Some(bytes) => Ok(Some(Self::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Cluster>> {
        Ok(self
            .scan_clusters()?
            .into_iter()
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
            .scan_clusters()?
            .into_iter()
            .filter(|cluster| filter.matches(cluster))
            .collect();

        clusters.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));

        let start = (page * page_size) as usize;
        Ok(clusters
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect())
    }

    async fn count_clusters(&self, filter: &ClusterFilter) -> Result<u64> {
        Ok(self
            .scan_clusters()?
            .into_iter()
            .filter(|cluster| filter.matches(cluster))
            .count() as u64)
    }

    async fn cluster_variants(&self, cluster_id: &Uuid) -> Result<Vec<VariantLink>> {
        let mut links: Vec<VariantLink> =
            match self.links_tree.get(Self::cluster_key(cluster_id))? {
                Some(bytes) => Self::deserialize(&bytes)?,
                None => Vec::new(),
            };
        sort_member_links(&mut links);
        Ok(links)
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let stale: Vec<(Uuid, String)> = self
            .scan_clusters()?
            .into_iter()
            .filter(|cluster| cluster.is_stale(cutoff))
            .map(|cluster| (cluster.id, cluster.matching_key.clone()))
            .collect();

        for (id, key) in &stale {
            let id_bytes = Self::cluster_key(id);
            let key_bytes = key.as_bytes().to_vec();

            (&self.clusters_tree, &self.links_tree, &self.keys_tree)
                .transaction(|(clusters, links, keys)| {
                    clusters.remove(id_bytes.as_slice())?;
                    links.remove(id_bytes.as_slice())?;
                    // Release the key only if it still points here
                    if let Some(holder) = keys.get(key_bytes.as_slice())? {
                        if holder.as_ref() == id_bytes.as_slice() {
                            keys.remove(key_bytes.as_slice())?;
                        }
                    }
                    Ok::<(), ConflictableTransactionError<AppError>>(())
                })
                .map_err(Self::unwrap_tx_err)?;
        }

        if !stale.is_empty() {
            self.db.flush_async().await?;
            tracing::info!(purged = stale.len(), "Purged stale clusters");
        }
        Ok(stale.len() as u64)
    }
}
