//! Item enrichment: text normalization, entity matching, event
//! classification, and derived-tag rules. Everything in this module is
//! pure and stateless per call; malformed input degrades to empty sets
//! or `Other`, never to an error.

pub mod classifier;
pub mod entities;
pub mod normalizer;
pub mod tags;

pub use classifier::{ClassifierRule, EventClassifier};
pub use entities::EntityMatcher;
pub use normalizer::normalize;
pub use tags::derive_tags;
