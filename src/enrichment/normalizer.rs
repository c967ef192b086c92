use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashSet};

/// Minimum token length kept after normalization.
const MIN_TOKEN_LEN: usize = 3;

/// English stopwords dropped during normalization.
///
/// Deliberately excludes words the event classifier keys on
/// ("why", "should", "think", "win", ...).
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "are", "was", "were", "been", "being", "but", "not", "you",
        "your", "his", "her", "its", "our", "their", "they", "them", "she", "him", "has", "have",
        "had", "this", "that", "these", "those", "with", "from", "into", "about", "over", "after",
        "before", "between", "out", "off", "than", "then", "there", "here", "when", "where",
        "what", "who", "whom", "which", "while", "all", "any", "both", "each", "few", "more",
        "most", "other", "some", "such", "only", "own", "same", "can", "will", "just", "don",
        "now", "also", "get", "got", "per", "via", "amid", "among",
    ]
    .into_iter()
    .collect()
});

/// Turn raw title + description text into a canonical token set.
///
/// Lowercases, strips punctuation to whitespace, drops stopwords and
/// tokens shorter than three characters. Deterministic and pure; empty
/// or non-text input yields an empty set, never an error.
pub fn normalize(title: &str, description: &str) -> BTreeSet<String> {
    let mut text = String::with_capacity(title.len() + description.len() + 1);
    text.push_str(title);
    text.push(' ');
    text.push_str(description);

    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}
