use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::Entity;

/// Minimum surname length accepted for last-name-only matches.
const MIN_SURNAME_LEN: usize = 5;

/// Surnames that are also common English words or very common family
/// names. These require a full-name match.
static COMMON_WORD_SURNAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Common English words
        "white", "brown", "green", "black", "gray", "grey", "young", "king", "cook", "hill",
        "wood", "stone", "rice", "rose", "wolf", "fox", "burns", "powers", "waters", "fields",
        "banks", "cross", "church", "price", "best", "land", "day", "long", "strong", "power",
        "chase",
        // Very common surnames that match other people (reporters, other players)
        "smith", "johnson", "jones", "miller", "wilson", "moore", "taylor",
    ]
    .into_iter()
    .collect()
});

/// Lexical entity matcher over an externally maintained dictionary.
///
/// Matching is case-insensitive whole-word (or multi-word phrase)
/// matching with explicit word boundaries; no fuzzy or phonetic
/// matching. Entities referenced only by nicknames absent from the
/// dictionary are missed — an accepted limitation of lexical matching,
/// not a defect.
pub struct EntityMatcher {
    /// Keywords establishing beat context (team names, venue, affiliate).
    /// Last-name-only matches count only when one of these is present,
    /// so a surname in an unrelated recap does not match our player.
    focus_keywords: Vec<String>,

    /// Compiled boundary patterns, keyed by term.
    pattern_cache: RwLock<HashMap<String, Regex>>,
}

impl EntityMatcher {
    pub fn new(focus_keywords: Vec<String>) -> Self {
        Self {
            focus_keywords: focus_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
            pattern_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Scan text against the current entity dictionary and return the
    /// set of matched entity IDs. Never errors; unmatchable input
    /// degrades to the empty set.
    pub fn match_entities(&self, text: &str, entities: &[Entity]) -> BTreeSet<i64> {
        let text_lower = text.to_lowercase();
        if text_lower.trim().is_empty() {
            return BTreeSet::new();
        }

        let has_focus_context = self.has_focus_context(&text_lower);

        let mut full_matches = BTreeSet::new();
        let mut surname_matches = BTreeSet::new();

        for entity in entities {
            if self.matches_any_term(entity, &text_lower) {
                full_matches.insert(entity.id);
                continue;
            }

            // Last-name-only match (lower confidence)
            if let Some(surname) = entity.name.rsplit(' ').next() {
                if surname.len() == entity.name.len() {
                    continue; // single-word name, already handled above
                }
                let surname = surname.to_lowercase();
                if surname.len() >= MIN_SURNAME_LEN
                    && !COMMON_WORD_SURNAMES.contains(surname.as_str())
                    && self.word_boundary_match(&surname, &text_lower)
                {
                    surname_matches.insert(entity.id);
                }
            }
        }

        // Surname-only matches are accepted only with beat context, so
        // "Skinner" in a junior-league recap does not match our Skinner.
        if has_focus_context {
            full_matches.extend(surname_matches);
        }
        full_matches
    }

    /// Whether the text mentions the covered beat at all.
    pub fn has_focus_context(&self, text_lower: &str) -> bool {
        self.focus_keywords.iter().any(|kw| text_lower.contains(kw))
    }

    fn matches_any_term(&self, entity: &Entity, text_lower: &str) -> bool {
        let name = entity.name.to_lowercase();
        if self.word_boundary_match(&name, text_lower) {
            return true;
        }
        entity
            .aliases
            .iter()
            .any(|alias| self.word_boundary_match(&alias.to_lowercase(), text_lower))
    }

    /// Whole-word occurrence check. Matches "price" in "carey price
    /// scored" but not inside "panarin-price-starts" slugs.
    fn word_boundary_match(&self, term: &str, text: &str) -> bool {
        if let Some(re) = self.pattern_cache.read().get(term) {
            return re.is_match(text);
        }

        let pattern = format!(
            r#"(?:^|[\s,.:;!?'"()]){}(?:[\s,.:;!?'"()]|$)"#,
            regex::escape(term)
        );
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => return false,
        };
        let matched = re.is_match(text);
        self.pattern_cache.write().insert(term.to_string(), re);
        matched
    }
}
