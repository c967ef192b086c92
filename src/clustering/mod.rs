//! Merge-vs-create decision making for incoming variants.

pub mod matcher;

pub use matcher::{ClusterMatcher, ClusteringConfig, MatchDecision};
