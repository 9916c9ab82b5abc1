//! Error types for zap-relay.

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid handoff trigger pattern: {0}")]
    BadTriggerPattern(#[from] regex::Error),
}

/// Message gateway errors.
///
/// These never escape `Dispatcher::deliver` — delivery is best-effort and
/// failures are logged, not propagated.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected message (status {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Completion backend errors.
///
/// These never escape `ReplyGenerator::generate` — the caller always gets
/// reply text, substituting a fixed fallback on failure.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion backend returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Result type alias for the relay.
pub type Result<T> = std::result::Result<T, Error>;
