use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::clustering::{ClusterMatcher, MatchDecision};
use crate::config::ProcessingConfig;
use crate::enrichment::{derive_tags, normalize, EntityMatcher, EventClassifier};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{Item, Variant};
use crate::reference::ReferenceData;
use crate::state::ClusterStore;

/// Terminal result of running one item through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// No candidate cleared the threshold; a new cluster was seeded
    Created { cluster_id: Uuid },
    /// The variant was merged into an existing cluster
    Merged { cluster_id: Uuid, score: f64 },
    /// The item failed the relevance gate and produced no cluster write
    Skipped { reason: String },
    /// The item was malformed beyond repair (fatal, no retry)
    Rejected { reason: String },
}

impl ProcessOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            ProcessOutcome::Created { .. } => "created",
            ProcessOutcome::Merged { .. } => "merged",
            ProcessOutcome::Skipped { .. } => "skipped",
            ProcessOutcome::Rejected { .. } => "rejected",
        }
    }
}

/// Runs the enrichment-and-clustering pipeline for one item at a time.
///
/// Enrichment is pure and fail-open; all waiting happens at the store
/// boundary. Transient store failures are retried with bounded backoff,
/// and a lost create race (`DuplicateEventKey`) triggers a mandatory
/// re-match against the now-visible cluster.
pub struct ItemProcessor {
    store: Arc<dyn ClusterStore>,
    reference: Arc<dyn ReferenceData>,
    matcher: ClusterMatcher,
    entity_matcher: EntityMatcher,
    classifier: EventClassifier,
    config: ProcessingConfig,
}

impl ItemProcessor {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        reference: Arc<dyn ReferenceData>,
        matcher: ClusterMatcher,
        config: ProcessingConfig,
    ) -> Self {
        let entity_matcher = EntityMatcher::new(config.focus_keywords.clone());
        Self {
            store,
            reference,
            matcher,
            entity_matcher,
            classifier: EventClassifier::default(),
            config,
        }
    }

    /// Override the default classifier rule table.
    pub fn with_classifier(mut self, classifier: EventClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn store(&self) -> &Arc<dyn ClusterStore> {
        &self.store
    }

    /// Process one incoming item to completion.
    pub async fn process_item(&self, item: Item) -> Result<ProcessOutcome> {
        tracing::debug!(
            item_id = %item.id,
            source = %item.source_name,
            "Processing item"
        );

        // Missing required fields are fatal: reject immediately, no retry.
        if let Err(e) = item.validate() {
            tracing::error!(item_id = %item.id, error = %e, "Item rejected");
            let outcome = ProcessOutcome::Rejected {
                reason: e.to_string(),
            };
            metrics::ITEMS_PROCESSED_TOTAL
                .with_label_values(&[outcome.metric_label()])
                .inc();
            return Ok(outcome);
        }

        let variant = self.enrich(&item).await?;
        let team_ids = self.reference.team_entity_ids().await?;

        // Relevance gate: aggregator feeds deliver plenty of off-beat
        // items. Title keywords or a matched non-team entity make an
        // item relevant; dedicated sources bypass the gate.
        if !item.skip_relevance_check {
            let title_lower = item.title.to_lowercase();
            let relevant = self.entity_matcher.has_focus_context(&title_lower)
                || !variant.non_team_entities(&team_ids).is_empty();
            if !relevant {
                tracing::debug!(item_id = %item.id, "Item skipped: not beat-relevant");
                let outcome = ProcessOutcome::Skipped {
                    reason: "not beat-relevant".to_string(),
                };
                metrics::ITEMS_PROCESSED_TOTAL
                    .with_label_values(&[outcome.metric_label()])
                    .inc();
                return Ok(outcome);
            }
        }

        let outcome = self.match_or_create(&variant, &team_ids).await?;
        metrics::ITEMS_PROCESSED_TOTAL
            .with_label_values(&[outcome.metric_label()])
            .inc();
        Ok(outcome)
    }

    /// Attach one externally-vetted variant to the pipeline as if
    /// freshly classified. Used by the submission workflow; reuses the
    /// matcher and store unchanged.
    pub async fn process_vetted_variant(&self, variant: Variant) -> Result<ProcessOutcome> {
        tracing::info!(variant_id = %variant.id, "Processing vetted variant");
        let team_ids = self.reference.team_entity_ids().await?;
        let outcome = self.match_or_create(&variant, &team_ids).await?;
        metrics::ITEMS_PROCESSED_TOTAL
            .with_label_values(&[outcome.metric_label()])
            .inc();
        Ok(outcome)
    }

    /// Enrich an item into a variant. Pure and fail-open: empty or
    /// garbage text degrades to empty sets and `Other`, never an error.
    async fn enrich(&self, item: &Item) -> Result<Variant> {
        let tokens = normalize(&item.title, &item.description);

        // The dictionary is read fresh on every call; it may be
        // reseeded between items.
        let dictionary = self.reference.entities().await?;
        let entities = self.entity_matcher.match_entities(&item.text(), &dictionary);

        let event_type = self.classifier.classify(&tokens);

        tracing::debug!(
            item_id = %item.id,
            tokens = tokens.len(),
            entities = entities.len(),
            event_type = %event_type,
            "Item enriched"
        );

        Ok(Variant::from_item(item, tokens, entities, event_type))
    }

    /// The merge-vs-create loop.
    ///
    /// Each round reads a fresh candidate set, so a cluster committed
    /// by a racing worker becomes visible before the next decision.
    async fn match_or_create(
        &self,
        variant: &Variant,
        team_ids: &BTreeSet<i64>,
    ) -> Result<ProcessOutcome> {
        let matching_key = variant.matching_key(team_ids);
        let tags = derive_tags(variant, &self.classifier);
        let cutoff = self.matcher.widest_cutoff(variant.published_at);
        let fresh_after = self
            .matcher
            .candidate_cutoff(variant.event_type, variant.published_at);

        for round in 0..self.config.match_attempts {
            let candidates = self
                .with_retry("find_candidates", || self.store.find_candidates(cutoff))
                .await?;

            match self.matcher.decide(variant, &candidates, team_ids) {
                MatchDecision::Attach { cluster_id, score } => {
                    match self
                        .with_retry("attach_variant", || {
                            self.store.attach_variant(&cluster_id, variant, score, &tags)
                        })
                        .await
                    {
                        Ok(cluster) => {
                            metrics::VARIANTS_MERGED_TOTAL.inc();
                            tracing::info!(
                                variant_id = %variant.id,
                                cluster_id = %cluster.id,
                                score = score,
                                source_count = cluster.source_count,
                                "Variant merged into existing cluster"
                            );
                            return Ok(ProcessOutcome::Merged { cluster_id, score });
                        }
                        // The candidate vanished under us (purged or
                        // consolidated); take a fresh look.
                        Err(AppError::NotFound(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                MatchDecision::Create => {
                    match self
                        .with_retry("create_cluster", || {
                            self.store
                                .create_cluster(variant, &matching_key, &tags, fresh_after)
                        })
                        .await
                    {
                        Ok(cluster) => {
                            metrics::CLUSTERS_CREATED_TOTAL.inc();
                            tracing::info!(
                                variant_id = %variant.id,
                                cluster_id = %cluster.id,
                                event_type = %cluster.event_type,
                                "New cluster created"
                            );
                            return Ok(ProcessOutcome::Created {
                                cluster_id: cluster.id,
                            });
                        }
                        Err(AppError::DuplicateEventKey { key }) => {
                            // Lost the create race: merge into the
                            // now-visible winner instead of retrying
                            // creation. The recomputed score may sit
                            // below the threshold; the shared key
                            // already establishes it is the same story.
                            metrics::CREATE_CONFLICTS_TOTAL.inc();
                            tracing::debug!(
                                variant_id = %variant.id,
                                matching_key = %key,
                                round = round,
                                "Create race lost; merging into key holder"
                            );
                            let holder = self
                                .with_retry("find_by_matching_key", || {
                                    self.store.find_by_matching_key(&key)
                                })
                                .await?;
                            let holder = match holder {
                                Some(holder) if holder.is_active() => holder,
                                // Holder vanished between the conflict
                                // and the lookup; take a fresh look.
                                _ => continue,
                            };
                            let score = self.matcher.score(variant, &holder, team_ids);
                            match self
                                .with_retry("attach_variant", || {
                                    self.store.attach_variant(&holder.id, variant, score, &tags)
                                })
                                .await
                            {
                                Ok(cluster) => {
                                    metrics::VARIANTS_MERGED_TOTAL.inc();
                                    tracing::info!(
                                        variant_id = %variant.id,
                                        cluster_id = %cluster.id,
                                        score = score,
                                        "Variant merged after losing create race"
                                    );
                                    return Ok(ProcessOutcome::Merged {
                                        cluster_id: cluster.id,
                                        score,
                                    });
                                }
                                Err(AppError::NotFound(_)) => continue,
                                Err(e) => return Err(e),
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Err(AppError::Processing(format!(
            "match-or-create did not settle after {} rounds",
            self.config.match_attempts
        )))
    }

    /// Retry a store operation on transient failure with exponential
    /// backoff. Non-transient errors surface immediately.
    async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    metrics::STORE_RETRIES_TOTAL.inc();
                    let backoff =
                        Duration::from_millis(self.config.retry_backoff_ms << (attempt - 1));
                    tracing::warn!(
                        op = op,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient store failure; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
