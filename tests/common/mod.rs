#![allow(dead_code)]

use chrono::{DateTime, Utc};
use std::sync::Arc;
use storycluster::clustering::{ClusterMatcher, ClusteringConfig};
use storycluster::config::ProcessingConfig;
use storycluster::models::{Entity, EntityType, EventType, Item, SourceRank, Variant};
use storycluster::processing::ItemProcessor;
use storycluster::reference::InMemoryReference;
use storycluster::state::ClusterStore;

pub const CELEBRINI: i64 = 1;
pub const EKLUND: i64 = 2;
pub const TOFFOLI: i64 = 3;
pub const SHARKS: i64 = 50;

pub fn dictionary() -> Vec<Entity> {
    vec![
        Entity::new(CELEBRINI, "Macklin Celebrini", EntityType::Player),
        Entity::new(EKLUND, "William Eklund", EntityType::Player),
        Entity::new(TOFFOLI, "Tyler Toffoli", EntityType::Player),
        Entity::new(SHARKS, "San Jose Sharks", EntityType::Team),
    ]
}

pub fn processor(store: Arc<dyn ClusterStore>) -> Arc<ItemProcessor> {
    let reference = Arc::new(InMemoryReference::seeded(dictionary(), Vec::new()));
    let config = ProcessingConfig {
        focus_keywords: vec!["sharks".to_string(), "san jose".to_string()],
        ..Default::default()
    };
    Arc::new(ItemProcessor::new(
        store,
        reference,
        ClusterMatcher::new(ClusteringConfig::default()),
        config,
    ))
}

pub fn item_at(
    source_id: i64,
    rank: SourceRank,
    title: &str,
    description: &str,
    published_at: DateTime<Utc>,
) -> Item {
    Item::new(
        source_id,
        format!("source-{}", source_id),
        rank,
        title.to_string(),
        description.to_string(),
        format!("https://example.com/{}/{}", source_id, published_at.timestamp()),
        published_at,
    )
}

pub fn item(source_id: i64, rank: SourceRank, title: &str, description: &str) -> Item {
    item_at(source_id, rank, title, description, Utc::now())
}

/// Hand-enriched variant for tests that drive the store directly.
pub fn variant_at(
    source_id: i64,
    rank: SourceRank,
    title: &str,
    tokens: &[&str],
    entities: &[i64],
    event_type: EventType,
    published_at: DateTime<Utc>,
) -> Variant {
    let base = item_at(source_id, rank, title, "", published_at);
    Variant::from_item(
        &base,
        tokens.iter().map(|t| t.to_string()).collect(),
        entities.iter().copied().collect(),
        event_type,
    )
}
