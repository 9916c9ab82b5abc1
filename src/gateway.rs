//! Outbound message delivery through the WhatsApp gateway.
//!
//! Delivery is at-most-once and fire-and-forget: the webhook that triggered
//! us is the retry mechanism (the upstream gateway redelivers on its own
//! schedule), so [`Dispatcher::deliver`] logs failures and never raises.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::config::RelayConfig;
use crate::error::GatewayError;

/// Per-call timeout on delivery; shorter than the completion timeout since
/// the gateway is expected to be nearby.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

// ── Gateway trait ───────────────────────────────────────────────────

/// One-way text delivery to a recipient address.
#[async_trait]
pub trait OutboundGateway: Send + Sync {
    /// Gateway name, for logging.
    fn name(&self) -> &str;

    /// Send one text message. 2xx with no transport error is success.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), GatewayError>;
}

// ── Evolution API client ────────────────────────────────────────────

/// Evolution-API-style gateway: `POST {base}/message/sendText/{instance}`
/// with an optional `apikey` header.
pub struct EvolutionGateway {
    client: reqwest::Client,
    base_url: String,
    instance: String,
    api_key: Option<SecretString>,
}

impl EvolutionGateway {
    pub fn new(
        base_url: impl Into<String>,
        instance: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            instance: instance.into(),
            api_key,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.gateway_base_url.clone(),
            config.gateway_instance.clone(),
            config.gateway_api_key.clone(),
        )
    }

    fn send_url(&self) -> String {
        format!(
            "{}/message/sendText/{}",
            self.base_url.trim_end_matches('/'),
            self.instance
        )
    }
}

#[async_trait]
impl OutboundGateway for EvolutionGateway {
    fn name(&self) -> &str {
        "evolution"
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({
            "number": recipient,
            "text": text,
        });

        let mut request = self
            .client
            .post(self.send_url())
            .timeout(DELIVERY_TIMEOUT)
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("apikey", key.expose_secret());
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────

/// Best-effort delivery wrapper. No retry, no queueing: a failed send is
/// logged and dropped, and the end user simply receives nothing.
pub struct Dispatcher {
    gateway: Arc<dyn OutboundGateway>,
}

impl Dispatcher {
    pub fn new(gateway: Arc<dyn OutboundGateway>) -> Self {
        Self { gateway }
    }

    /// Deliver one message, absorbing any failure.
    pub async fn deliver(&self, recipient: &str, text: &str) {
        match self.gateway.send_text(recipient, text).await {
            Ok(()) => {
                info!(
                    gateway = self.gateway.name(),
                    recipient,
                    chars = text.len(),
                    "message delivered"
                );
            }
            Err(e) => {
                warn!(
                    gateway = self.gateway.name(),
                    recipient,
                    error = %e,
                    "delivery failed, dropping message"
                );
            }
        }
    }
}
