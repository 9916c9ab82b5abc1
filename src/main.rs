use std::sync::Arc;

use anyhow::Context;

use zap_relay::completion::{ChatCompletionClient, ReplyGenerator};
use zap_relay::config::RelayConfig;
use zap_relay::gateway::{Dispatcher, EvolutionGateway};
use zap_relay::routing::RoutingPolicy;
use zap_relay::webhook::{RelayState, relay_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = RelayConfig::from_env().context("invalid configuration")?;

    eprintln!("🤖 zap-relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.port);
    eprintln!("   Model: {}", config.persona.model);
    eprintln!(
        "   Gateway: {} (instance: {})",
        config.gateway_base_url, config.gateway_instance
    );
    eprintln!(
        "   Authorized sender: {}",
        config.authorized_sender.as_deref().unwrap_or("unrestricted")
    );

    let backend = Arc::new(ChatCompletionClient::new(
        config.completion_base_url.clone(),
        config.completion_api_key.clone(),
        config.persona.model.clone(),
    ));
    let generator = Arc::new(ReplyGenerator::new(backend, &config.persona));
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(EvolutionGateway::from_config(
        &config,
    ))));
    let policy = Arc::new(RoutingPolicy::from_config(&config)?);

    let state = RelayState {
        policy,
        generator,
        dispatcher,
        identity: format!("zap-relay v{}", env!("CARGO_PKG_VERSION")),
    };

    let app = relay_routes(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
