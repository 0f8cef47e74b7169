//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a list of chat messages to a model and get
//! a complete reply back. The summarizer builds on this; it never talks
//! HTTP itself.
//!
//! Implementations: OpenAI-compatible endpoints (Ollama, OpenAI, OpenRouter).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// One chat-completion call. The summarizer sends a system prompt and a
/// single user message holding the paper text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<Message>,

    /// Sampling temperature; summaries want a low one.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Reply length cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.2
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

/// The model's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub message: Message,
    /// Absent when the endpoint does not report usage (older Ollama builds).
    pub usage: Option<Usage>,
    /// The model that answered, as reported by the endpoint.
    pub model: String,
}

/// Token counts reported by the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An LLM backend the summarizer can call.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name as configured (`ollama`, `openai`, ...).
    fn name(&self) -> &str;

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Models the endpoint offers. Empty when it cannot say.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Whether the endpoint answers at all. Used by `doctor`.
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
