//! Error types for the relay.

use std::fmt;
use std::time::Duration;

/// Top-level error type for the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Configuration-related errors. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// What the remote side told us when a chat-completion call was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    /// Human-readable message from the structured `error` object.
    Message(String),
    /// No structured error in the body; only the HTTP status is known.
    Status(u16),
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::Message(msg) => f.write_str(msg),
            ProviderFailure::Status(code) => write!(f, "HTTP status {code}"),
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error(
        "Unsupported LLM provider {provider:?} (supported: compatible_openai, openai, openai_compatible, compat)"
    )]
    UnsupportedProvider { provider: String },

    #[error("Transport failure talking to {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("LLM reply timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Provider {provider} returned an error: {failure}")]
    Provider {
        provider: String,
        failure: ProviderFailure,
    },

    #[error("Provider {provider} returned no completion choices")]
    EmptyResponse { provider: String },
}

/// Errors from invoking the external bridge helper.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to spawn bridge helper {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Bridge helper failed ({status}), output={output}")]
    Exited { status: String, output: String },

    #[error("Malformed bridge output ({source}): {output}")]
    MalformedOutput {
        #[source]
        source: serde_json::Error,
        output: String,
    },

    #[error("Bridge {action} timed out after {timeout:?}")]
    Timeout {
        action: &'static str,
        timeout: Duration,
    },

    #[error("Failed to encode bridge request: {0}")]
    Encode(#[from] serde_json::Error),
}
