//! Policy router — classifies a canonical message into exactly one decision.
//!
//! The chain is evaluated in a fixed order and the first matching rule wins;
//! that order is a correctness contract, not an optimization. A message with
//! an empty sender and a handoff keyword is still `Invalid`, and a
//! self-message from an unauthorized number is still `LoopSelfMessage`.

use regex::Regex;
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::ConfigError;
use crate::normalize::CanonicalMessage;

/// Default human-handoff trigger vocabulary (deployment language of the
/// original rollout). Matched case-insensitively as substrings.
pub const DEFAULT_HANDOFF_TRIGGERS: &[&str] = &["atendente", "pessoa", "humano"];

// ── Routing decision ────────────────────────────────────────────────

/// Outcome of routing one inbound message. Exactly one variant is produced
/// per request; each carries the message that produced it.
#[derive(Debug, Clone)]
pub enum RoutingDecision {
    /// Empty sender or empty text — dropped without dispatch.
    Invalid(CanonicalMessage),
    /// The gateway echoed one of our own outbound messages back. Replying
    /// would loop forever, so it is dropped.
    LoopSelfMessage(CanonicalMessage),
    /// An authorized sender is configured and this isn't it.
    Unauthorized(CanonicalMessage),
    /// The text asks for a human; escalate instead of auto-replying.
    HumanHandoff(CanonicalMessage),
    /// Default path: answer via the completion backend.
    AutoReply(CanonicalMessage),
}

impl RoutingDecision {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "invalid",
            Self::LoopSelfMessage(_) => "self_message",
            Self::Unauthorized(_) => "unauthorized",
            Self::HumanHandoff(_) => "human_handoff",
            Self::AutoReply(_) => "auto_reply",
        }
    }

    /// The message this decision was made for.
    pub fn message(&self) -> &CanonicalMessage {
        match self {
            Self::Invalid(m)
            | Self::LoopSelfMessage(m)
            | Self::Unauthorized(m)
            | Self::HumanHandoff(m)
            | Self::AutoReply(m) => m,
        }
    }
}

// ── Handoff matcher ─────────────────────────────────────────────────

/// Case-insensitive substring matcher over the handoff trigger vocabulary.
///
/// Substring, not word-boundary: "humanoide" triggers just like "humano".
#[derive(Debug, Clone)]
pub struct HandoffMatcher {
    regex: Regex,
}

impl HandoffMatcher {
    /// Compile a matcher from a trigger vocabulary. An empty vocabulary
    /// matches nothing.
    pub fn new(triggers: &[&str]) -> Result<Self, regex::Error> {
        let pattern = if triggers.is_empty() {
            // matches no input
            r"[^\s\S]".to_string()
        } else {
            let escaped: Vec<String> = triggers.iter().map(|t| regex::escape(t)).collect();
            format!("(?i){}", escaped.join("|"))
        };
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    /// Matcher over [`DEFAULT_HANDOFF_TRIGGERS`].
    pub fn default_triggers() -> Self {
        Self::new(DEFAULT_HANDOFF_TRIGGERS).unwrap()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

// ── Policy ──────────────────────────────────────────────────────────

/// Immutable routing policy, built once at startup from [`RelayConfig`].
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    /// When set, only this sender is served. Unset means everyone.
    pub authorized_sender: Option<String>,
    /// Human-handoff trigger matcher.
    pub handoff: HandoffMatcher,
}

impl RoutingPolicy {
    pub fn new(authorized_sender: Option<String>, handoff: HandoffMatcher) -> Self {
        Self {
            authorized_sender,
            handoff,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.authorized_sender.clone(),
            HandoffMatcher::new(DEFAULT_HANDOFF_TRIGGERS)?,
        ))
    }
}

/// Route a canonical message. Pure, total, deterministic: every message
/// produces exactly one decision, decided by the first matching rule.
pub fn route(msg: CanonicalMessage, policy: &RoutingPolicy) -> RoutingDecision {
    if msg.sender.is_empty() || msg.text.is_empty() {
        return RoutingDecision::Invalid(msg);
    }

    if msg.is_from_self {
        debug!(sender = %msg.sender, "dropping echoed self-message");
        return RoutingDecision::LoopSelfMessage(msg);
    }

    if let Some(ref authorized) = policy.authorized_sender
        && msg.sender != *authorized
    {
        return RoutingDecision::Unauthorized(msg);
    }

    if policy.handoff.matches(&msg.text) {
        return RoutingDecision::HumanHandoff(msg);
    }

    RoutingDecision::AutoReply(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(sender: &str, text: &str, is_from_self: bool) -> CanonicalMessage {
        CanonicalMessage {
            sender: sender.into(),
            text: text.into(),
            is_from_self,
            received_at: Utc::now(),
        }
    }

    fn open_policy() -> RoutingPolicy {
        RoutingPolicy::new(None, HandoffMatcher::default_triggers())
    }

    fn restricted_policy(number: &str) -> RoutingPolicy {
        RoutingPolicy::new(Some(number.into()), HandoffMatcher::default_triggers())
    }

    // ── Individual rules ────────────────────────────────────────────

    #[test]
    fn empty_sender_is_invalid() {
        let d = route(msg("", "oi", false), &open_policy());
        assert!(matches!(d, RoutingDecision::Invalid(_)));
    }

    #[test]
    fn empty_text_is_invalid() {
        let d = route(msg("5511", "", false), &open_policy());
        assert!(matches!(d, RoutingDecision::Invalid(_)));
    }

    #[test]
    fn self_message_is_dropped() {
        let d = route(msg("5511", "oi", true), &open_policy());
        assert!(matches!(d, RoutingDecision::LoopSelfMessage(_)));
    }

    #[test]
    fn unauthorized_sender_is_ignored() {
        let d = route(msg("5511Y", "oi", false), &restricted_policy("5511X"));
        assert!(matches!(d, RoutingDecision::Unauthorized(_)));
    }

    #[test]
    fn authorized_sender_passes() {
        let d = route(msg("5511X", "oi", false), &restricted_policy("5511X"));
        assert!(matches!(d, RoutingDecision::AutoReply(_)));
    }

    #[test]
    fn unset_authorization_allows_everyone() {
        let d = route(msg("anyone", "oi", false), &open_policy());
        assert!(matches!(d, RoutingDecision::AutoReply(_)));
    }

    #[test]
    fn handoff_keyword_triggers_escalation() {
        let d = route(
            msg("5511", "quero falar com atendente", false),
            &open_policy(),
        );
        assert!(matches!(d, RoutingDecision::HumanHandoff(_)));
    }

    #[test]
    fn handoff_is_case_insensitive() {
        let d = route(msg("5511", "FALAR COM HUMANO", false), &open_policy());
        assert!(matches!(d, RoutingDecision::HumanHandoff(_)));
    }

    #[test]
    fn handoff_matches_substrings() {
        // Substring semantics are intentional: "humanoide" still triggers.
        let d = route(msg("5511", "sou um humanoide", false), &open_policy());
        assert!(matches!(d, RoutingDecision::HumanHandoff(_)));
    }

    #[test]
    fn plain_message_defaults_to_auto_reply() {
        let d = route(msg("5511", "qual o horário de vocês?", false), &open_policy());
        assert!(matches!(d, RoutingDecision::AutoReply(_)));
    }

    // ── Order under rule overlap ────────────────────────────────────

    #[test]
    fn invalid_beats_handoff() {
        let d = route(msg("", "quero um atendente", false), &open_policy());
        assert!(matches!(d, RoutingDecision::Invalid(_)));
    }

    #[test]
    fn self_message_beats_handoff() {
        let d = route(msg("5511", "chama a pessoa", true), &open_policy());
        assert!(matches!(d, RoutingDecision::LoopSelfMessage(_)));
    }

    #[test]
    fn self_message_beats_unauthorized() {
        let d = route(msg("5511Y", "oi", true), &restricted_policy("5511X"));
        assert!(matches!(d, RoutingDecision::LoopSelfMessage(_)));
    }

    #[test]
    fn unauthorized_beats_handoff() {
        let d = route(
            msg("5511Y", "quero falar com atendente", false),
            &restricted_policy("5511X"),
        );
        assert!(matches!(d, RoutingDecision::Unauthorized(_)));
    }

    #[test]
    fn decision_carries_the_message() {
        let d = route(msg("5511", "oi", false), &open_policy());
        assert_eq!(d.message().sender, "5511");
        assert_eq!(d.message().text, "oi");
    }

    #[test]
    fn routing_is_deterministic() {
        let policy = restricted_policy("5511X");
        for _ in 0..3 {
            let d = route(msg("5511Y", "humano", false), &policy);
            assert_eq!(d.label(), "unauthorized");
        }
    }

    // ── Matcher construction ────────────────────────────────────────

    #[test]
    fn empty_vocabulary_matches_nothing() {
        let m = HandoffMatcher::new(&[]).unwrap();
        assert!(!m.matches("atendente humano pessoa"));
        assert!(!m.matches(""));
    }

    #[test]
    fn custom_vocabulary_is_escaped() {
        let m = HandoffMatcher::new(&["agent (human)"]).unwrap();
        assert!(m.matches("I want an Agent (Human) now"));
        assert!(!m.matches("agent human"));
    }

    #[test]
    fn decision_labels() {
        let m = msg("5511", "oi", false);
        assert_eq!(RoutingDecision::Invalid(m.clone()).label(), "invalid");
        assert_eq!(
            RoutingDecision::LoopSelfMessage(m.clone()).label(),
            "self_message"
        );
        assert_eq!(
            RoutingDecision::Unauthorized(m.clone()).label(),
            "unauthorized"
        );
        assert_eq!(
            RoutingDecision::HumanHandoff(m.clone()).label(),
            "human_handoff"
        );
        assert_eq!(RoutingDecision::AutoReply(m).label(), "auto_reply");
    }
}
