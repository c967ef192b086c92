use std::collections::BTreeSet;

use crate::models::EventType;

/// One ordered classification rule: if any keyword appears in the token
/// set, the rule fires.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    pub event_type: EventType,
    pub keywords: BTreeSet<String>,
}

impl ClassifierRule {
    pub fn new(event_type: EventType, keywords: &[&str]) -> Self {
        Self {
            event_type,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn fires(&self, tokens: &BTreeSet<String>) -> bool {
        self.keywords.iter().any(|k| tokens.contains(k))
    }
}

/// Keyword-driven event classifier.
///
/// Rules are evaluated in a fixed, explicit order and the first rule
/// whose keyword set intersects the token set wins. Rule order is a
/// tie-break and part of the contract: reordering changes behavior.
pub struct EventClassifier {
    rules: Vec<ClassifierRule>,
}

impl EventClassifier {
    pub fn with_rules(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Classify a token set into exactly one event type. No firing rule
    /// means `Other`; empty input degrades the same way, never errors.
    pub fn classify(&self, tokens: &BTreeSet<String>) -> EventType {
        self.rules
            .iter()
            .find(|rule| rule.fires(tokens))
            .map(|rule| rule.event_type)
            .unwrap_or(EventType::Other)
    }

    /// Event types of every firing rule, in rule order. Used for
    /// derived-tag assignment, which wants all matching categories
    /// rather than just the primary one.
    pub fn matching_event_types(&self, tokens: &BTreeSet<String>) -> Vec<EventType> {
        self.rules
            .iter()
            .filter(|rule| rule.fires(tokens))
            .map(|rule| rule.event_type)
            .collect()
    }
}

impl Default for EventClassifier {
    /// The production rule table. Order matters: trade talk usually
    /// quotes game vocabulary, so transactional rules come first and
    /// `game` acts as a catch-all near the end.
    fn default() -> Self {
        Self::with_rules(vec![
            ClassifierRule::new(
                EventType::Trade,
                &["trade", "traded", "trades", "acquire", "acquired", "dealt"],
            ),
            ClassifierRule::new(
                EventType::Injury,
                &["injury", "injured", "sidelined", "indefinitely", "ailment"],
            ),
            ClassifierRule::new(
                EventType::Lineup,
                &["lineup", "lines", "starting", "scratched", "scratch"],
            ),
            ClassifierRule::new(
                EventType::Recall,
                &["recall", "recalled", "promote", "promoted"],
            ),
            ClassifierRule::new(
                EventType::Waiver,
                &["waiver", "waivers", "claimed", "claim"],
            ),
            ClassifierRule::new(
                EventType::Signing,
                &["sign", "signed", "signing", "contract", "extension"],
            ),
            ClassifierRule::new(
                EventType::Prospect,
                &["prospect", "prospects", "draft", "drafted", "junior"],
            ),
            ClassifierRule::new(
                EventType::Game,
                &[
                    "game", "win", "loss", "score", "final", "defeat", "beat", "period", "goal",
                    "assist", "shutout", "overtime", "recap",
                ],
            ),
            ClassifierRule::new(
                EventType::Opinion,
                &["think", "believe", "opinion", "analysis", "why", "should"],
            ),
        ])
    }
}
