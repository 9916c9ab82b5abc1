//! Payload normalization — reduces a raw webhook envelope to a canonical
//! `(sender, text)` pair.
//!
//! Gateway configurations differ in where they put the message body, so the
//! text is located by an ordered probe table; the first probe that yields a
//! usable value wins. The probe result is an explicit [`ExtractedText`] sum
//! type so "nothing found" is distinguishable from "found an empty string".

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

// ── Canonical message ───────────────────────────────────────────────

/// Canonical form of an inbound message, derived per request.
#[derive(Debug, Clone)]
pub struct CanonicalMessage {
    /// Opaque channel address of the sender. Empty when the envelope
    /// carried none — the router treats that as invalid.
    pub sender: String,
    /// Trimmed message text. Empty when no probe matched.
    pub text: String,
    /// Whether the envelope carries the gateway's "sent by this account"
    /// marker. This is the loop guard signal, distinct from authorization.
    pub is_from_self: bool,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

// ── Text extraction ─────────────────────────────────────────────────

/// Result of probing the envelope for message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedText {
    /// A string field matched; trimmed verbatim.
    Resolved(String),
    /// A scalar (number or boolean) matched and was rendered to text.
    /// Containers are never coerced — no JSON representation may leak
    /// into a user-facing reply.
    Coerced(String),
    /// No probe yielded usable text.
    Missing,
}

impl ExtractedText {
    /// Collapse to plain text; `Missing` becomes the empty string.
    pub fn into_text(self) -> String {
        match self {
            Self::Resolved(t) | Self::Coerced(t) => t,
            Self::Missing => String::new(),
        }
    }
}

type Probe = fn(&Value) -> Option<&Value>;

/// Ordered extraction rules — first match wins. The order is a contract:
/// nested `text.message` shapes take precedence over the direct `message`
/// shortcut, and a bare top-level `text` string is the last resort.
const TEXT_PROBES: &[(&str, Probe)] = &[
    ("text.message", |v| v.get("text")?.as_object()?.get("message")),
    ("message", |v| {
        v.get("message").filter(|m| !m.is_object() && !m.is_array())
    }),
    ("body", |v| v.get("body")),
    ("message.text", |v| v.get("message")?.as_object()?.get("text")),
    ("message.content.body", |v| {
        v.get("message")?.get("content")?.as_object()?.get("body")
    }),
    ("message.message", |v| {
        v.get("message")?.as_object()?.get("message")
    }),
    ("text", |v| {
        v.get("text").filter(|t| !t.is_object() && !t.is_array())
    }),
];

/// Probe the envelope for message text, in precedence order.
pub fn extract_text(envelope: &Value) -> ExtractedText {
    for (path, probe) in TEXT_PROBES {
        let Some(candidate) = probe(envelope) else {
            continue;
        };
        match candidate {
            Value::String(s) => return ExtractedText::Resolved(s.trim().to_string()),
            Value::Number(n) => {
                debug!(path, "coercing numeric message body to text");
                return ExtractedText::Coerced(n.to_string());
            }
            Value::Bool(b) => {
                debug!(path, "coercing boolean message body to text");
                return ExtractedText::Coerced(b.to_string());
            }
            // null and containers are not text; keep probing
            _ => continue,
        }
    }
    ExtractedText::Missing
}

// ── Sender and self-marker extraction ───────────────────────────────

/// Extract the sender address (`phone`, falling back to `sender`).
/// Numeric phone fields are rendered to their decimal form.
fn extract_sender(envelope: &Value) -> String {
    for key in ["phone", "sender"] {
        match envelope.get(key) {
            Some(Value::String(s)) => return s.trim().to_string(),
            Some(Value::Number(n)) => return n.to_string(),
            _ => continue,
        }
    }
    String::new()
}

/// Whether the envelope carries the explicit "sent by this account" marker.
///
/// Evolution-style gateways set `fromMe` either at the top level or under
/// the message `key` object when echoing the bot's own outbound messages.
fn self_marker(envelope: &Value) -> bool {
    envelope
        .get("fromMe")
        .and_then(Value::as_bool)
        .or_else(|| {
            envelope
                .get("key")
                .and_then(|k| k.get("fromMe"))
                .and_then(Value::as_bool)
        })
        .unwrap_or(false)
}

/// Reduce a raw envelope to its canonical form.
///
/// Never fails: a malformed envelope yields empty fields, which the router
/// classifies as invalid.
pub fn normalize(envelope: &Value) -> CanonicalMessage {
    CanonicalMessage {
        sender: extract_sender(envelope),
        text: extract_text(envelope).into_text(),
        is_from_self: self_marker(envelope),
        received_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── The seven payload shapes ────────────────────────────────────

    #[test]
    fn extracts_text_message_shape() {
        let env = json!({"phone": "551199999999", "text": {"message": "oi"}});
        assert_eq!(extract_text(&env), ExtractedText::Resolved("oi".into()));
    }

    #[test]
    fn extracts_direct_message_string() {
        let env = json!({"message": "tudo bem?"});
        assert_eq!(
            extract_text(&env),
            ExtractedText::Resolved("tudo bem?".into())
        );
    }

    #[test]
    fn extracts_body_string() {
        let env = json!({"body": "bom dia"});
        assert_eq!(
            extract_text(&env),
            ExtractedText::Resolved("bom dia".into())
        );
    }

    #[test]
    fn extracts_message_text_shape() {
        let env = json!({"message": {"text": "oi"}});
        assert_eq!(extract_text(&env), ExtractedText::Resolved("oi".into()));
    }

    #[test]
    fn extracts_message_content_body_shape() {
        let env = json!({"message": {"content": {"body": "oi"}}});
        assert_eq!(extract_text(&env), ExtractedText::Resolved("oi".into()));
    }

    #[test]
    fn extracts_message_message_shape() {
        let env = json!({"message": {"message": "oi"}});
        assert_eq!(extract_text(&env), ExtractedText::Resolved("oi".into()));
    }

    #[test]
    fn extracts_top_level_text_fallback() {
        let env = json!({"text": "oi"});
        assert_eq!(extract_text(&env), ExtractedText::Resolved("oi".into()));
    }

    // ── Precedence and edge cases ───────────────────────────────────

    #[test]
    fn nested_text_message_beats_direct_message() {
        let env = json!({"text": {"message": "nested"}, "message": "direct"});
        assert_eq!(
            extract_text(&env),
            ExtractedText::Resolved("nested".into())
        );
    }

    #[test]
    fn direct_message_beats_body() {
        let env = json!({"message": "direct", "body": "other"});
        assert_eq!(
            extract_text(&env),
            ExtractedText::Resolved("direct".into())
        );
    }

    #[test]
    fn message_text_beats_message_content_body() {
        let env = json!({"message": {"text": "a", "content": {"body": "b"}}});
        assert_eq!(extract_text(&env), ExtractedText::Resolved("a".into()));
    }

    #[test]
    fn whitespace_is_trimmed() {
        let env = json!({"message": "  olá  \n"});
        assert_eq!(extract_text(&env), ExtractedText::Resolved("olá".into()));
    }

    #[test]
    fn numeric_body_is_coerced() {
        let env = json!({"message": 42});
        assert_eq!(extract_text(&env), ExtractedText::Coerced("42".into()));
    }

    #[test]
    fn boolean_body_is_coerced() {
        let env = json!({"body": true});
        assert_eq!(extract_text(&env), ExtractedText::Coerced("true".into()));
    }

    #[test]
    fn containers_are_never_coerced() {
        // An array where text would be expected must not leak its JSON form.
        let env = json!({"body": ["oi"], "message": {"unknown": 1}});
        assert_eq!(extract_text(&env), ExtractedText::Missing);
    }

    #[test]
    fn null_candidate_falls_through_to_next_probe() {
        let env = json!({"text": {"message": null}, "message": "fallback"});
        assert_eq!(
            extract_text(&env),
            ExtractedText::Resolved("fallback".into())
        );
    }

    #[test]
    fn absent_everywhere_yields_missing() {
        let env = json!({"phone": "551199999999", "unrelated": {"field": 1}});
        assert_eq!(extract_text(&env), ExtractedText::Missing);
        assert_eq!(extract_text(&env).into_text(), "");
    }

    // ── Sender and self marker ──────────────────────────────────────

    #[test]
    fn sender_from_phone_field() {
        let env = json!({"phone": "551199999999", "text": "oi"});
        assert_eq!(normalize(&env).sender, "551199999999");
    }

    #[test]
    fn sender_falls_back_to_sender_field() {
        let env = json!({"sender": "551188888888", "text": "oi"});
        assert_eq!(normalize(&env).sender, "551188888888");
    }

    #[test]
    fn numeric_phone_is_rendered() {
        let env = json!({"phone": 551199999999u64, "text": "oi"});
        assert_eq!(normalize(&env).sender, "551199999999");
    }

    #[test]
    fn missing_sender_is_empty_not_error() {
        let env = json!({"text": "oi"});
        let msg = normalize(&env);
        assert_eq!(msg.sender, "");
        assert_eq!(msg.text, "oi");
    }

    #[test]
    fn from_me_top_level_marker() {
        let env = json!({"phone": "5511", "text": "oi", "fromMe": true});
        assert!(normalize(&env).is_from_self);
    }

    #[test]
    fn from_me_key_marker() {
        let env = json!({"phone": "5511", "text": "oi", "key": {"fromMe": true}});
        assert!(normalize(&env).is_from_self);
    }

    #[test]
    fn from_me_defaults_false() {
        let env = json!({"phone": "5511", "text": "oi", "key": {"fromMe": false}});
        assert!(!normalize(&env).is_from_self);
        let env = json!({"phone": "5511", "text": "oi"});
        assert!(!normalize(&env).is_from_self);
    }

    #[test]
    fn non_boolean_from_me_is_ignored() {
        let env = json!({"phone": "5511", "text": "oi", "fromMe": "true"});
        assert!(!normalize(&env).is_from_self);
    }
}
