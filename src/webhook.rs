//! Webhook endpoint — the per-request orchestrator.
//!
//! Flow: envelope → normalize → route → at most one dispatch pair → status
//! token. The endpoint always answers HTTP 200: a 4xx/5xx would make the
//! upstream gateway treat the webhook as undelivered and retry, which is
//! exactly what the status tokens exist to avoid.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::completion::ReplyGenerator;
use crate::gateway::Dispatcher;
use crate::normalize::normalize;
use crate::routing::{RoutingDecision, RoutingPolicy, route};

/// Ack sent to the customer when they ask for a human.
pub const HANDOFF_ACK: &str = "Tudo bem 🌺! Já chamei nossa atendente pra falar com você!";

/// Notice sent to the operator when a customer asks for a human.
fn escalation_notice(sender: &str, text: &str) -> String {
    format!("⚠️ Cliente {sender} pediu atendimento humano: '{text}'")
}

// ── State and responses ─────────────────────────────────────────────

/// Shared, immutable per-process state for the webhook routes.
#[derive(Clone)]
pub struct RelayState {
    pub policy: Arc<RoutingPolicy>,
    pub generator: Arc<ReplyGenerator>,
    pub dispatcher: Arc<Dispatcher>,
    /// Identity string reported by the health endpoint.
    pub identity: String,
}

/// Body of every webhook answer. `reply` is present only for `ok`.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
}

impl WebhookResponse {
    fn status(status: &'static str) -> Self {
        Self {
            status,
            reply: None,
        }
    }

    fn ok(reply: String) -> Self {
        Self {
            status: "ok",
            reply: Some(reply),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: String,
}

// ── Routes ──────────────────────────────────────────────────────────

/// Build the relay's router: the webhook receiver and a health check.
pub fn relay_routes(state: RelayState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health — constant identity answer.
async fn health(State(state): State<RelayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: state.identity.clone(),
    })
}

/// POST /webhook — always 200, body parsed leniently.
async fn handle_webhook(State(state): State<RelayState>, body: Bytes) -> Json<WebhookResponse> {
    let request_id = Uuid::new_v4();
    let span = info_span!("webhook", %request_id);

    async move {
        let envelope: serde_json::Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "webhook body is not valid JSON");
                return Json(WebhookResponse::status("invalid"));
            }
        };
        Json(process_envelope(&state, &envelope).await)
    }
    .instrument(span)
    .await
}

/// Normalize, route and act on one envelope. Each arm is terminal; at most
/// one delivery pair happens per request (two only for a human handoff).
async fn process_envelope(state: &RelayState, envelope: &serde_json::Value) -> WebhookResponse {
    let msg = normalize(envelope);
    info!(sender = %msg.sender, text = %msg.text, "message received");

    let decision = route(msg, &state.policy);
    info!(decision = decision.label(), "routing decision");

    match decision {
        RoutingDecision::Invalid(_) => {
            warn!("dropping message with empty sender or text");
            WebhookResponse::status("invalid")
        }
        RoutingDecision::LoopSelfMessage(_) => WebhookResponse::status("self_message_ignored"),
        RoutingDecision::Unauthorized(msg) => {
            info!(sender = %msg.sender, "ignoring unauthorized sender");
            WebhookResponse::status("ignored")
        }
        RoutingDecision::HumanHandoff(msg) => {
            state.dispatcher.deliver(&msg.sender, HANDOFF_ACK).await;
            match state.policy.authorized_sender.as_deref() {
                Some(operator) => {
                    state
                        .dispatcher
                        .deliver(operator, &escalation_notice(&msg.sender, &msg.text))
                        .await;
                }
                None => {
                    warn!(
                        sender = %msg.sender,
                        "handoff requested but no operator number configured, skipping notice"
                    );
                }
            }
            WebhookResponse::status("human_mode_triggered")
        }
        RoutingDecision::AutoReply(msg) => {
            let reply = state.generator.generate(&msg.text).await;
            state.dispatcher.deliver(&msg.sender, &reply).await;
            WebhookResponse::ok(reply)
        }
    }
}
