//! Configuration types.
//!
//! Everything is read once at startup into an immutable [`RelayConfig`] that
//! is passed explicitly into the request path — request handling never reads
//! ambient environment state.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default system instruction for the attendant persona.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Você é a atendente virtual da loja. Responda sempre em \
     português, de forma curta, simpática e acolhedora. Ajude o cliente com dúvidas sobre \
     produtos, pedidos e horários. Se não souber a resposta, diga que vai verificar com a equipe.";

/// Default completion model when `ZAP_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default OpenAI-compatible completion endpoint (Groq).
pub const DEFAULT_COMPLETION_URL: &str = "https://api.groq.com/openai/v1";

/// Default webhook port.
pub const DEFAULT_PORT: u16 = 3000;

/// Fixed persona handed to the completion backend: system instruction plus
/// model identifier. Loaded once, immutable for the life of the process.
#[derive(Debug, Clone)]
pub struct AgentPersona {
    /// System-role instruction sent with every completion request.
    pub system_prompt: String,
    /// Model identifier understood by the completion backend.
    pub model: String,
}

impl Default for AgentPersona {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Process-wide relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Port the webhook server binds on.
    pub port: u16,
    /// The only sender allowed to talk to the bot. `None` means unrestricted.
    /// Also the recipient of human-handoff escalation notices.
    pub authorized_sender: Option<String>,
    /// Persona for auto-replies.
    pub persona: AgentPersona,
    /// Completion backend API key.
    pub completion_api_key: SecretString,
    /// Completion backend base URL (OpenAI-compatible).
    pub completion_base_url: String,
    /// Message gateway base URL.
    pub gateway_base_url: String,
    /// Message gateway instance identifier (part of the send URL).
    pub gateway_instance: String,
    /// Message gateway API key, sent as the `apikey` header when set.
    pub gateway_api_key: Option<SecretString>,
}

impl RelayConfig {
    /// Load configuration from the environment.
    ///
    /// `GROQ_API_KEY`, `EVOLUTION_API_URL` and `EVOLUTION_INSTANCE` are
    /// required; everything else has a default or is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = match std::env::var("ZAP_RELAY_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "ZAP_RELAY_PORT".into(),
                message: format!("not a valid port number: '{raw}'"),
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let completion_api_key = require_env("GROQ_API_KEY")?;
        let gateway_base_url = require_env("EVOLUTION_API_URL")?;
        let gateway_instance = require_env("EVOLUTION_INSTANCE")?;

        let persona = AgentPersona {
            system_prompt: non_empty_env("ZAP_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            model: non_empty_env("ZAP_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        Ok(Self {
            port,
            authorized_sender: non_empty_env("ZAP_AUTHORIZED_NUMBER"),
            persona,
            completion_api_key: SecretString::from(completion_api_key),
            completion_base_url: non_empty_env("ZAP_COMPLETION_URL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_URL.to_string()),
            gateway_base_url: trim_trailing_slash(&gateway_base_url),
            gateway_instance,
            gateway_api_key: non_empty_env("EVOLUTION_API_KEY").map(SecretString::from),
        })
    }
}

/// Read a required environment variable; empty counts as missing.
fn require_env(key: &str) -> Result<String, ConfigError> {
    non_empty_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Read an environment variable, treating unset and whitespace-only as `None`.
fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn trim_trailing_slash(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
