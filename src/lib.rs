//! storycluster — enrichment-and-clustering core for a single-beat
//! news aggregator.
//!
//! Raw items arrive from many sources covering the same beat; this
//! crate tokenizes and entity-tags each one, classifies its event type,
//! and folds near-duplicate coverage of the same underlying story into
//! clusters. Clusters carry monotonic aggregates (token and entity
//! unions, distinct source count, rank-then-recency headline) and are
//! purged after a retention window.
//!
//! The pipeline entry point is [`processing::ItemProcessor`]; storage
//! backends implement [`state::ClusterStore`].

pub mod clustering;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod metrics;
pub mod models;
pub mod processing;
pub mod reference;
pub mod scheduler;
pub mod state;

pub use error::{AppError, Result};
