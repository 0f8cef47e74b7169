//! OpenAI-compatible provider implementation.
//!
//! Works with: Ollama (default), OpenAI, OpenRouter, vLLM, LM Studio and any
//! endpoint exposing `/v1/chat/completions`.
//!
//! Only non-streaming chat completions are used: a summary is one short
//! JSON reply. `/models` backs `list_models` and `health_check`.

use async_trait::async_trait;
use papertriage_core::error::ProviderError;
use papertriage_core::message::{Message, Role};
use papertriage_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default HTTP timeout; the summarizer applies its own, usually shorter, one.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a provider whose HTTP client gives up after `timeout`.
    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_key)
    }

    fn chat_request(request: &ProviderRequest) -> ChatRequest<'_> {
        ChatRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: role_name(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop: &request.stop,
            stream: false,
        }
    }

    /// Map a non-success status to a provider error.
    fn status_error(status: u16, body: String, model: &str) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => ProviderError::AuthenticationFailed(format!(
                "endpoint rejected the API key (HTTP {status})"
            )),
            404 => ProviderError::ModelNotFound(model.to_string()),
            _ => ProviderError::ApiError {
                status_code: status,
                message: body,
            },
        }
    }

    /// Turn a chat-completions body into a response.
    fn parse_completion(body: &str) -> Result<ProviderResponse, ProviderError> {
        let invalid = |message: String| ProviderError::ApiError {
            status_code: 200,
            message,
        };

        let completion: ChatCompletion = serde_json::from_str(body)
            .map_err(|e| invalid(format!("unreadable completion: {e}")))?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| invalid("completion has no choices".into()))?;

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage: completion.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: completion.model,
        })
    }

    async fn fetch_models(&self) -> Result<reqwest::Response, ProviderError> {
        self.authorized(self.client.get(format!("{}/models", self.base_url)))
            .send()
            .await
            .map_err(transport_error)
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Requesting completion"
        );

        let response = self
            .authorized(self.client.post(&url))
            .json(&Self::chat_request(&request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            warn!(provider = %self.name, status = status.as_u16(), body = %text, "Completion request failed");
            return Err(Self::status_error(status.as_u16(), text, &request.model));
        }

        Self::parse_completion(&text)
    }

    /// Model ids offered by the endpoint; empty when it does not list them.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let response = self.fetch_models().await?;
        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let list: ModelList = response.json().await.map_err(transport_error)?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(self.fetch_models().await?.status().is_success())
    }
}

// Wire types for `/chat/completions` and `/models`.

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "no_stop")]
    stop: &'a [String],
    stream: bool,
}

fn no_stop(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_name_and_url() {
        let provider = OpenAiCompatProvider::new("ollama", "http://localhost:11434/v1", "ollama");
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url().contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://host:8000/v1/", "");
        assert_eq!(provider.base_url(), "http://host:8000/v1");
    }

    #[test]
    fn chat_request_wire_format() {
        let mut request = ProviderRequest::new(
            "llama3.2:latest",
            vec![Message::system("Be terse"), Message::user("Summarize")],
        );
        request.max_tokens = Some(256);
        let body =
            serde_json::to_value(OpenAiCompatProvider::chat_request(&request)).unwrap();

        assert_eq!(body["model"], "llama3.2:latest");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Summarize");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stream"], false);
        assert!(body.get("stop").is_none());
    }

    #[test]
    fn parse_completion_reads_first_choice() {
        let body = r#"{
            "model": "llama3.2:latest",
            "choices": [{"message": {"role": "assistant", "content": "{\"problem\": \"x\"}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let response = OpenAiCompatProvider::parse_completion(body).unwrap();
        assert_eq!(response.message.content, "{\"problem\": \"x\"}");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_completion_without_choices_fails() {
        let body = r#"{"model": "m", "choices": []}"#;
        assert!(OpenAiCompatProvider::parse_completion(body).is_err());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            OpenAiCompatProvider::status_error(429, String::new(), "m"),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            OpenAiCompatProvider::status_error(401, String::new(), "m"),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            OpenAiCompatProvider::status_error(404, String::new(), "m"),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(
            OpenAiCompatProvider::status_error(500, "boom".into(), "m"),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }
}
