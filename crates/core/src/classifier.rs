//! Agent Participant Classifier
//!
//! Rooms carry no dedicated role attribute for the AI agent, so the agent is
//! picked out of the roster with an ordered chain of heuristics. Rules are
//! tried one at a time across the whole roster; the first rule that matches
//! anyone decides, and within a rule the roster order breaks ties.

use crate::participant::{Participant, ParticipantKind};
use std::fmt;
use std::sync::Arc;

/// Keyword looked for in display names and metadata by the default chain.
pub const DEFAULT_AGENT_KEYWORD: &str = "agent";
/// Identity prefix used by the default chain.
pub const DEFAULT_IDENTITY_PREFIX: &str = "agent-";

type Predicate = Arc<dyn Fn(&Participant) -> bool + Send + Sync>;

/// A single classification heuristic.
#[derive(Clone)]
pub enum ClassifierRule {
    /// Display name contains the keyword, ignoring case.
    NameContains(String),
    /// Metadata contains the keyword, ignoring case. Absent metadata never matches.
    MetadataContains(String),
    /// Identity starts with the literal prefix.
    IdentityPrefix(String),
    /// The transport itself reports this participant kind.
    Kind(ParticipantKind),
    /// A caller-supplied predicate, named for logging.
    Custom(String, Predicate),
}

impl ClassifierRule {
    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Participant) -> bool + Send + Sync + 'static,
    {
        Self::Custom(name.into(), Arc::new(predicate))
    }

    pub fn matches(&self, participant: &Participant) -> bool {
        match self {
            Self::NameContains(keyword) => participant
                .name
                .as_deref()
                .is_some_and(|name| contains_ignore_case(name, keyword)),
            Self::MetadataContains(keyword) => participant
                .metadata
                .as_deref()
                .is_some_and(|meta| contains_ignore_case(meta, keyword)),
            Self::IdentityPrefix(prefix) => participant.identity.starts_with(prefix.as_str()),
            Self::Kind(kind) => participant.kind == *kind,
            Self::Custom(_, predicate) => predicate(participant),
        }
    }
}

impl fmt::Debug for ClassifierRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameContains(k) => f.debug_tuple("NameContains").field(k).finish(),
            Self::MetadataContains(k) => f.debug_tuple("MetadataContains").field(k).finish(),
            Self::IdentityPrefix(p) => f.debug_tuple("IdentityPrefix").field(p).finish(),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Custom(name, _) => f.debug_tuple("Custom").field(name).finish(),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// An ordered chain of [`ClassifierRule`]s.
#[derive(Debug, Clone)]
pub struct AgentClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for AgentClassifier {
    fn default() -> Self {
        Self::with_keyword_and_prefix(DEFAULT_AGENT_KEYWORD, DEFAULT_IDENTITY_PREFIX)
    }
}

impl AgentClassifier {
    /// Builds the standard three-rule chain (name, metadata, identity prefix)
    /// with a custom keyword and prefix.
    pub fn with_keyword_and_prefix(keyword: &str, prefix: &str) -> Self {
        Self {
            rules: vec![
                ClassifierRule::NameContains(keyword.to_string()),
                ClassifierRule::MetadataContains(keyword.to_string()),
                ClassifierRule::IdentityPrefix(prefix.to_string()),
            ],
        }
    }

    /// Builds a classifier from an explicit rule list.
    pub fn from_rules(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Appends a rule with the lowest precedence so far.
    pub fn with_rule(mut self, rule: ClassifierRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Returns the participant the highest-precedence matching rule selects,
    /// or `None` when nobody in the roster looks like an agent.
    pub fn classify<'a>(&self, roster: &'a [Participant]) -> Option<&'a Participant> {
        self.rules
            .iter()
            .find_map(|rule| roster.iter().find(|p| rule.matches(p)))
    }
}

/// Classifies with the default rule chain.
pub fn classify_agent(roster: &[Participant]) -> Option<&Participant> {
    AgentClassifier::default().classify(roster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_human_only_rosters_have_no_agent() {
        assert!(classify_agent(&[]).is_none());

        let roster = vec![
            Participant::new("alice").with_name("Alice"),
            Participant::new("bob").with_metadata(r#"{"role":"viewer"}"#),
        ];
        assert!(classify_agent(&roster).is_none());
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        let roster = vec![
            Participant::new("alice"),
            Participant::new("p-2").with_name("Support AGENT"),
        ];
        assert_eq!(classify_agent(&roster).unwrap().identity, "p-2");
    }

    #[test]
    fn test_metadata_match_is_case_insensitive() {
        let roster = vec![Participant::new("p-9").with_metadata(r#"{"role":"Agent"}"#)];
        assert_eq!(classify_agent(&roster).unwrap().identity, "p-9");
    }

    #[test]
    fn test_identity_prefix_alone_is_enough() {
        let roster = vec![
            Participant::new("alice").with_name("Alice"),
            Participant::new("agent-7").with_name("Helper").with_metadata("{}"),
        ];
        assert_eq!(classify_agent(&roster).unwrap().identity, "agent-7");
    }

    #[test]
    fn test_identity_prefix_is_case_sensitive_literal() {
        let roster = vec![Participant::new("Agent-7"), Participant::new("agentx")];
        assert!(classify_agent(&roster).is_none());
    }

    #[test]
    fn test_earlier_rule_beats_earlier_roster_position() {
        // The prefix-only participant comes first, but the metadata rule ranks higher.
        let roster = vec![
            Participant::new("agent-1"),
            Participant::new("worker").with_metadata("voice agent"),
        ];
        assert_eq!(classify_agent(&roster).unwrap().identity, "worker");

        // Same roster without the metadata match falls through to rule three.
        let roster = vec![Participant::new("agent-1"), Participant::new("worker")];
        assert_eq!(classify_agent(&roster).unwrap().identity, "agent-1");
    }

    #[test]
    fn test_roster_order_breaks_ties_within_a_rule() {
        let roster = vec![
            Participant::new("b").with_name("agent B"),
            Participant::new("a").with_name("agent A"),
        ];
        assert_eq!(classify_agent(&roster).unwrap().identity, "b");
    }

    #[test]
    fn test_classification_is_repeatable() {
        let roster = vec![
            Participant::new("x").with_metadata("AGENT"),
            Participant::new("agent-y"),
        ];
        let classifier = AgentClassifier::default();
        let first = classifier.classify(&roster).map(|p| p.identity.clone());
        let second = classifier.classify(&roster).map(|p| p.identity.clone());
        assert_eq!(first, second);
    }

    #[test]
    fn test_appended_rules_run_after_defaults() {
        let classifier = AgentClassifier::default()
            .with_rule(ClassifierRule::Kind(ParticipantKind::Agent))
            .with_rule(ClassifierRule::custom("bot suffix", |p| {
                p.identity.ends_with("-bot")
            }));
        assert_eq!(classifier.rules().len(), 5);

        let roster = vec![
            Participant::new("helper-bot"),
            Participant::new("sip-1").with_kind(ParticipantKind::Agent),
        ];
        assert_eq!(classifier.classify(&roster).unwrap().identity, "sip-1");

        let roster = vec![Participant::new("helper-bot")];
        assert_eq!(classifier.classify(&roster).unwrap().identity, "helper-bot");
    }

    #[test]
    fn test_custom_keyword_and_prefix() {
        let classifier = AgentClassifier::with_keyword_and_prefix("assistant", "ai-");
        let roster = vec![
            Participant::new("agent-1").with_name("agent"),
            Participant::new("ai-2"),
        ];
        assert_eq!(classifier.classify(&roster).unwrap().identity, "ai-2");
    }
}
