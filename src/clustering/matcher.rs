use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{Cluster, EventType, Variant};

/// Scores closer than this are treated as tied and broken by recency.
const SCORE_EPSILON: f64 = 1e-9;

/// Tunable clustering constants, injected at construction so deployments
/// can tune them and tests stay deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Minimum combined score for attaching to an existing cluster
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Weight of the non-team entity overlap term
    #[serde(default = "default_entity_weight")]
    pub entity_weight: f64,

    /// Weight of the token Jaccard term
    #[serde(default = "default_token_weight")]
    pub token_weight: f64,

    /// Weight of the event compatibility term
    #[serde(default = "default_event_weight")]
    pub event_weight: f64,

    /// Lookback window for all event types except `game` (hours)
    #[serde(default = "default_window_hours")]
    pub default_window_hours: i64,

    /// Lookback window for `game` events (hours)
    #[serde(default = "default_game_window_hours")]
    pub game_window_hours: i64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            entity_weight: default_entity_weight(),
            token_weight: default_token_weight(),
            event_weight: default_event_weight(),
            default_window_hours: default_window_hours(),
            game_window_hours: default_game_window_hours(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.62
}

fn default_entity_weight() -> f64 {
    0.55
}

fn default_token_weight() -> f64 {
    0.35
}

fn default_event_weight() -> f64 {
    0.10
}

fn default_window_hours() -> i64 {
    72
}

fn default_game_window_hours() -> i64 {
    24
}

/// Outcome of matching a variant against the candidate clusters.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision {
    /// Attach to an existing cluster with the given similarity score
    Attach { cluster_id: Uuid, score: f64 },
    /// No candidate cleared the threshold; seed a new cluster
    Create,
}

/// The core merge-vs-create algorithm.
///
/// Pure computation: scores a new variant against candidate open
/// clusters and returns a decision. The write is performed by the
/// cluster store under its concurrency discipline.
pub struct ClusterMatcher {
    config: ClusteringConfig,
}

impl ClusterMatcher {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Lookback window for a given event type. Game coverage goes stale
    /// fast; everything else gets the default window.
    pub fn lookback_window(&self, event_type: EventType) -> Duration {
        match event_type {
            EventType::Game => Duration::hours(self.config.game_window_hours),
            _ => Duration::hours(self.config.default_window_hours),
        }
    }

    /// Oldest `last_seen_at` a candidate may have for this variant.
    pub fn candidate_cutoff(&self, event_type: EventType, published_at: DateTime<Utc>) -> DateTime<Utc> {
        published_at - self.lookback_window(event_type)
    }

    /// Widest cutoff across all event types, for the store's candidate scan.
    pub fn widest_cutoff(&self, published_at: DateTime<Utc>) -> DateTime<Utc> {
        published_at - Duration::hours(self.config.default_window_hours)
    }

    /// Combined similarity score of a variant against one cluster.
    ///
    /// S = entity_weight * EntityOverlap
    ///   + token_weight  * TokenJaccard
    ///   + event_weight  * EventCompat
    ///
    /// Entity overlap is Jaccard over non-team entities; both terms are
    /// 0 when their union is empty. Event compatibility is exact-match
    /// only.
    pub fn score(&self, variant: &Variant, cluster: &Cluster, team_ids: &BTreeSet<i64>) -> f64 {
        let variant_entities = variant.non_team_entities(team_ids);
        let cluster_entities: BTreeSet<i64> = cluster
            .entities
            .iter()
            .copied()
            .filter(|id| !team_ids.contains(id))
            .collect();

        let entity_overlap = jaccard(&variant_entities, &cluster_entities);
        let token_jaccard = jaccard(&variant.tokens, &cluster.tokens);
        let event_compat = if variant.event_type == cluster.event_type {
            1.0
        } else {
            0.0
        };

        self.config.entity_weight * entity_overlap
            + self.config.token_weight * token_jaccard
            + self.config.event_weight * event_compat
    }

    /// Decide merge-vs-create for a variant against the candidate set.
    ///
    /// Candidates outside the lookback window are never scored,
    /// regardless of textual similarity. Ties on the maximum score break
    /// by most recently updated candidate, then by cluster id, so the
    /// outcome never depends on iteration order.
    pub fn decide(
        &self,
        variant: &Variant,
        candidates: &[Cluster],
        team_ids: &BTreeSet<i64>,
    ) -> MatchDecision {
        let cutoff = self.candidate_cutoff(variant.event_type, variant.published_at);

        let mut best: Option<(f64, DateTime<Utc>, Uuid)> = None;

        for cluster in candidates {
            if !cluster.is_active() || cluster.last_seen_at < cutoff {
                continue;
            }

            let score = self.score(variant, cluster, team_ids);
            let contender = (score, cluster.last_seen_at, cluster.id);

            let wins = match best {
                None => true,
                Some((best_score, best_seen, best_id)) => {
                    if score > best_score + SCORE_EPSILON {
                        true
                    } else if (score - best_score).abs() <= SCORE_EPSILON {
                        cluster.last_seen_at > best_seen
                            || (cluster.last_seen_at == best_seen && cluster.id > best_id)
                    } else {
                        false
                    }
                }
            };

            if wins {
                best = Some(contender);
            }
        }

        match best {
            Some((score, _, cluster_id)) if score >= self.config.similarity_threshold => {
                MatchDecision::Attach { cluster_id, score }
            }
            _ => MatchDecision::Create,
        }
    }
}

/// Jaccard similarity |A ∩ B| / |A ∪ B|; 0 when the union is empty.
fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, SourceRank};
    use chrono::Duration;

    fn variant(
        tokens: &[&str],
        entities: &[i64],
        event_type: EventType,
        rank: SourceRank,
        published_at: DateTime<Utc>,
    ) -> Variant {
        let item = Item::new(
            rank as i64,
            "src".to_string(),
            rank,
            "title".to_string(),
            String::new(),
            "https://example.com/x".to_string(),
            published_at,
        );
        Variant::from_item(
            &item,
            tokens.iter().map(|t| t.to_string()).collect(),
            entities.iter().copied().collect(),
            event_type,
        )
    }

    fn cluster_from(v: &Variant) -> Cluster {
        Cluster::from_variant(v, v.matching_key(&BTreeSet::new()))
    }

    #[test]
    fn test_concrete_merge_scenario() {
        // Variant A: tokens {trade, sharks, celebrini}, entities {1},
        // trade, official, published T.
        let t = Utc::now();
        let a = variant(
            &["trade", "sharks", "celebrini"],
            &[1],
            EventType::Trade,
            SourceRank::Official,
            t,
        );
        let cluster = cluster_from(&a);

        // Variant B: tokens {trade, sharks, celebrini, pick}, entities {1},
        // trade, press, published T+2m.
        let b = variant(
            &["trade", "sharks", "celebrini", "pick"],
            &[1],
            EventType::Trade,
            SourceRank::Press,
            t + Duration::minutes(2),
        );

        let matcher = ClusterMatcher::new(ClusteringConfig::default());
        let team_ids = BTreeSet::new();

        // TokenJaccard = 3/4, EntityOverlap = 1, EventCompat = 1
        // S = 0.55 + 0.35 * 0.75 + 0.10 = 0.9125
        let score = matcher.score(&b, &cluster, &team_ids);
        assert!((score - 0.9125).abs() < 1e-9);

        match matcher.decide(&b, &[cluster.clone()], &team_ids) {
            MatchDecision::Attach { cluster_id, score } => {
                assert_eq!(cluster_id, cluster.id);
                assert!(score >= 0.62);
            }
            MatchDecision::Create => panic!("expected attach"),
        }
    }

    #[test]
    fn test_concrete_no_merge_scenario() {
        let t = Utc::now();
        let a = variant(
            &["trade", "sharks", "celebrini"],
            &[1],
            EventType::Trade,
            SourceRank::Official,
            t,
        );
        let cluster = cluster_from(&a);

        // Variant C: different entity, different event type
        let c = variant(
            &["injury", "sharks", "goalie"],
            &[7],
            EventType::Injury,
            SourceRank::Press,
            t + Duration::minutes(10),
        );

        let matcher = ClusterMatcher::new(ClusteringConfig::default());
        let team_ids = BTreeSet::new();

        let score = matcher.score(&c, &cluster, &team_ids);
        assert!(score < 0.62);
        assert_eq!(matcher.decide(&c, &[cluster], &team_ids), MatchDecision::Create);
    }

    #[test]
    fn test_window_enforcement() {
        let t = Utc::now();
        let a = variant(&["trade", "sharks"], &[1], EventType::Trade, SourceRank::Press, t);
        let mut cluster = cluster_from(&a);
        // Identical variant would score 1.0, but the cluster is outside
        // the 72h lookback window.
        cluster.last_seen_at = t - Duration::hours(73);
        cluster.first_seen_at = cluster.last_seen_at;

        let b = variant(&["trade", "sharks"], &[1], EventType::Trade, SourceRank::Press, t);
        let matcher = ClusterMatcher::new(ClusteringConfig::default());

        assert_eq!(
            matcher.decide(&b, &[cluster], &BTreeSet::new()),
            MatchDecision::Create
        );
    }

    #[test]
    fn test_game_window_is_shorter() {
        let t = Utc::now();
        let a = variant(&["game", "recap", "win"], &[2], EventType::Game, SourceRank::Press, t);
        let mut cluster = cluster_from(&a);
        cluster.last_seen_at = t - Duration::hours(30);

        // 30h stale: inside the default 72h window but outside the 24h
        // game window.
        let b = variant(&["game", "recap", "win"], &[2], EventType::Game, SourceRank::Press, t);
        let matcher = ClusterMatcher::new(ClusteringConfig::default());
        assert_eq!(
            matcher.decide(&b, &[cluster], &BTreeSet::new()),
            MatchDecision::Create
        );
    }

    #[test]
    fn test_tie_breaks_by_recency() {
        let t = Utc::now();
        let seed = variant(&["trade", "sharks"], &[1], EventType::Trade, SourceRank::Press, t);

        let mut older = cluster_from(&seed);
        older.last_seen_at = t - Duration::hours(10);
        let mut newer = cluster_from(&seed);
        newer.id = Uuid::new_v4();
        newer.last_seen_at = t - Duration::hours(1);

        let b = variant(&["trade", "sharks"], &[1], EventType::Trade, SourceRank::Press, t);
        let matcher = ClusterMatcher::new(ClusteringConfig::default());

        // Identical scores; the more recently updated cluster must win,
        // in either candidate order.
        for candidates in [
            vec![older.clone(), newer.clone()],
            vec![newer.clone(), older.clone()],
        ] {
            match matcher.decide(&b, &candidates, &BTreeSet::new()) {
                MatchDecision::Attach { cluster_id, .. } => assert_eq!(cluster_id, newer.id),
                MatchDecision::Create => panic!("expected attach"),
            }
        }
    }

    #[test]
    fn test_empty_entity_union_scores_zero_term() {
        let t = Utc::now();
        let a = variant(&["trade", "sharks"], &[], EventType::Trade, SourceRank::Press, t);
        let cluster = cluster_from(&a);
        let b = variant(&["trade", "sharks"], &[], EventType::Trade, SourceRank::Press, t);

        let matcher = ClusterMatcher::new(ClusteringConfig::default());
        let score = matcher.score(&b, &cluster, &BTreeSet::new());

        // Entity term contributes 0; tokens and event type carry the rest.
        assert!((score - (0.35 + 0.10)).abs() < 1e-9);
    }

    #[test]
    fn test_team_entities_excluded_from_overlap() {
        let t = Utc::now();
        let team_ids: BTreeSet<i64> = [50].into_iter().collect();

        // Shared team entity must not inflate the overlap between
        // otherwise unrelated items.
        let a = variant(&["trade", "winger"], &[50, 1], EventType::Trade, SourceRank::Press, t);
        let cluster = cluster_from(&a);
        let b = variant(&["injury", "goalie"], &[50, 7], EventType::Injury, SourceRank::Press, t);

        let matcher = ClusterMatcher::new(ClusteringConfig::default());
        let score = matcher.score(&b, &cluster, &team_ids);
        assert!((score - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_inactive_clusters_never_scored() {
        use crate::models::ClusterStatus;
        let t = Utc::now();
        let a = variant(&["trade", "sharks"], &[1], EventType::Trade, SourceRank::Press, t);
        let mut cluster = cluster_from(&a);
        cluster.status = ClusterStatus::Archived;

        let matcher = ClusterMatcher::new(ClusteringConfig::default());
        assert_eq!(
            matcher.decide(&a, &[cluster], &BTreeSet::new()),
            MatchDecision::Create
        );
    }
}
