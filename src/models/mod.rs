pub mod cluster;
pub mod entity;
pub mod item;
pub mod tag;
pub mod variant;

pub use cluster::{Cluster, ClusterStatus, EventType, VariantLink};
pub use entity::{make_slug, Entity, EntityType};
pub use item::{Item, SourceRank};
pub use tag::Tag;
pub use variant::Variant;
