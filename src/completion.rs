//! Reply generation via an OpenAI-compatible chat completion backend.
//!
//! The backend sits behind the [`CompletionBackend`] trait so the webhook
//! orchestrator (and tests) never depend on the HTTP client directly.
//! [`ReplyGenerator::generate`] never fails — on any transport, status or
//! parse problem it logs the error and returns a fixed fallback reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AgentPersona;
use crate::error::CompletionError;

/// Per-call timeout on the completion request.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// User-facing reply substituted whenever the backend fails.
pub const FALLBACK_REPLY: &str =
    "Desculpa 🌊, tive um probleminha técnico. Pode repetir sua mensagem?";

// ── Backend trait ───────────────────────────────────────────────────

/// A chat completion backend: one system instruction, one user turn, no
/// history. Each call is stateless.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Produce a completion for a single system+user exchange.
    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<String, CompletionError>;
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

// ── HTTP client ─────────────────────────────────────────────────────

/// OpenAI-compatible `/chat/completions` client (Groq in the original
/// deployment).
pub struct ChatCompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionBackend for ChatCompletionClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatTurn {
                    role: "system",
                    content: system_prompt,
                },
                ChatTurn {
                    role: "user",
                    content: user_text,
                },
            ],
        };

        let resp = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .timeout(COMPLETION_TIMEOUT)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CompletionError::MalformedResponse("no choices in response".into()))?;

        debug!(model = %self.model, chars = reply.len(), "completion received");
        Ok(reply)
    }
}

// ── Generator ───────────────────────────────────────────────────────

/// Wraps a completion backend with the fixed persona. Total: the caller
/// always gets reply text, never an error.
pub struct ReplyGenerator {
    backend: Arc<dyn CompletionBackend>,
    system_prompt: String,
}

impl ReplyGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, persona: &AgentPersona) -> Self {
        Self {
            backend,
            system_prompt: persona.system_prompt.clone(),
        }
    }

    /// Generate a reply for the user's text.
    ///
    /// On any backend failure — or an empty completion, which would send the
    /// user a blank message — the failure is logged and the fixed fallback
    /// reply is returned instead.
    pub async fn generate(&self, text: &str) -> String {
        match self.backend.complete(&self.system_prompt, text).await {
            Ok(reply) if !reply.trim().is_empty() => reply,
            Ok(_) => {
                warn!(
                    model = %self.backend.model_name(),
                    "completion backend returned empty reply, using fallback"
                );
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                warn!(
                    model = %self.backend.model_name(),
                    error = %e,
                    "completion backend failed, using fallback"
                );
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
