//! LLM integration for the relay.
//!
//! Supports:
//! - **OpenAI-compatible**: any backend speaking the `/chat/completions` wire format
//!
//! `create_provider` is the single place a provider identifier turns into a
//! concrete client; new backends plug in there.

pub mod openai;

pub use openai::OpenAiCompatProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;

/// Produces a reply for one inbound message given a persona.
///
/// Each call is independent: no history is carried between calls.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier used in logs and errors.
    fn provider_name(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Ask the model for a reply to `user_message` under `system_prompt`.
    async fn reply(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError>;
}

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAiCompatible,
}

impl LlmBackend {
    /// Resolve a configured provider identifier (case-insensitive, trimmed).
    pub fn from_identifier(identifier: &str) -> Result<Self, LlmError> {
        match identifier.trim().to_lowercase().as_str() {
            "compatible_openai" | "openai" | "openai_compatible" | "compat" => {
                Ok(LlmBackend::OpenAiCompatible)
            }
            _ => Err(LlmError::UnsupportedProvider {
                provider: identifier.to_string(),
            }),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key: secrecy::SecretString,
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    /// Overall HTTP timeout for one completion request.
    pub timeout: Duration,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match LlmBackend::from_identifier(&config.provider)? {
        LlmBackend::OpenAiCompatible => {
            tracing::info!(
                "Using OpenAI-compatible backend at {} (model: {})",
                config.base_url,
                config.model
            );
            Ok(Arc::new(OpenAiCompatProvider::new(config)?))
        }
    }
}

/// Run one reply under a deadline. On expiry the in-flight request is
/// dropped and `LlmError::Timeout` is returned.
pub async fn reply_with_deadline(
    llm: &dyn LlmProvider,
    deadline: Duration,
    system_prompt: &str,
    user_message: &str,
) -> Result<String, LlmError> {
    match tokio::time::timeout(deadline, llm.reply(system_prompt, user_message)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout { timeout: deadline }),
    }
}
