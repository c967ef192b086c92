use std::collections::BTreeSet;

use super::classifier::EventClassifier;
use super::normalizer::normalize;
use crate::models::{SourceRank, Variant};

/// Phrases that signal rumor-grade reporting.
const RUMOR_PHRASES: &[&str] = &[
    "hearing",
    "sources say",
    "linked to",
    "in talks",
    "rumor",
    "reportedly",
];

/// Derive tag slugs for a variant.
///
/// Assigns all matching event-category tags from the title (not just
/// the primary event type), a "rumors" tag for rumor-flavored press
/// items, and an "official" tag for official sources. Only the title is
/// consulted for keyword tags because aggregator descriptions often
/// carry injected, unrelated snippets.
pub fn derive_tags(variant: &Variant, classifier: &EventClassifier) -> BTreeSet<String> {
    let mut slugs = BTreeSet::new();

    let title_tokens = normalize(&variant.title, "");
    for event_type in classifier.matching_event_types(&title_tokens) {
        slugs.insert(event_type.to_string());
    }

    let title_lower = variant.title.to_lowercase();
    let has_rumor_language = RUMOR_PHRASES.iter().any(|p| title_lower.contains(p));
    if has_rumor_language && variant.source_rank == SourceRank::Press {
        slugs.insert("rumors".to_string());
    }

    if variant.source_rank == SourceRank::Official {
        slugs.insert("official".to_string());
    }

    slugs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, Item};
    use chrono::Utc;

    fn variant(title: &str, rank: SourceRank) -> Variant {
        let item = Item::new(
            1,
            "src".to_string(),
            rank,
            title.to_string(),
            String::new(),
            "https://example.com/x".to_string(),
            Utc::now(),
        );
        Variant::from_item(&item, normalize(title, ""), BTreeSet::new(), EventType::Other)
    }

    #[test]
    fn test_all_matching_event_tags() {
        let v = variant("Sharks sign forward after big game win", SourceRank::Press);
        let tags = derive_tags(&v, &EventClassifier::default());
        assert!(tags.contains("signing"));
        assert!(tags.contains("game"));
    }

    #[test]
    fn test_rumor_tag_press_only() {
        let classifier = EventClassifier::default();

        let press = variant("Sharks reportedly in talks with winger", SourceRank::Press);
        assert!(derive_tags(&press, &classifier).contains("rumors"));

        // Same language from an official source is not a rumor
        let official = variant("Sharks reportedly in talks with winger", SourceRank::Official);
        assert!(!derive_tags(&official, &classifier).contains("rumors"));
    }

    #[test]
    fn test_official_tag() {
        let v = variant("Roster move announced", SourceRank::Official);
        assert!(derive_tags(&v, &EventClassifier::default()).contains("official"));
    }
}
