//! OpenAI-compatible chat-completion client.
//!
//! Speaks `POST {base_url}/chat/completions` with a bearer credential. Works
//! with OpenAI itself and any server exposing the same wire format.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, ProviderFailure};
use crate::llm::{LlmConfig, LlmProvider};

const PROVIDER_NAME: &str = "compatible_openai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Client for an OpenAI-wire-compatible backend.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl OpenAiCompatProvider {
    /// The HTTP client's overall timeout is `config.timeout`, the same value
    /// the relay uses as its reply deadline.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Self::transport_error)?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(err: impl std::error::Error + Send + Sync + 'static) -> LlmError {
        LlmError::Transport {
            provider: PROVIDER_NAME.to_string(),
            source: Box::new(err),
        }
    }

    fn request_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout {
                timeout: self.timeout,
            }
        } else {
            Self::transport_error(err)
        }
    }
}

/// Pull the remote error message out of a rejected response body, if any.
fn provider_failure(status: u16, body: &[u8]) -> ProviderFailure {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .map(ProviderFailure::Message)
        .unwrap_or(ProviderFailure::Status(status))
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn reply(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            let failure = provider_failure(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), "Chat completion rejected: {}", failure);
            return Err(LlmError::Provider {
                provider: PROVIDER_NAME.to_string(),
                failure,
            });
        }

        let parsed: ChatResponse = serde_json::from_slice(&body).map_err(Self::transport_error)?;

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "Chat completion usage"
            );
        }

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: PROVIDER_NAME.to_string(),
            })?;

        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}
