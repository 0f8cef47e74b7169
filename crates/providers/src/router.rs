//! Provider router — builds the configured LLM provider.
//!
//! Every supported backend speaks the OpenAI chat-completions dialect, so
//! routing is a matter of picking the base URL and the API key.

use std::sync::Arc;
use std::time::Duration;

use papertriage_config::LlmConfig;
use papertriage_core::error::ProviderError;
use papertriage_core::provider::Provider;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider described by `[llm]`.
///
/// The API key is read from the environment variable named by
/// `api_key_env`; it is never stored in the config file.
pub fn build_from_config(config: &LlmConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.provider.trim().to_lowercase();

    let base_url = match &config.api_url {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => default_base_url(&name).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider '{name}'; set llm.api_url to its endpoint"
            ))
        })?,
    };

    let api_key = resolve_api_key(&name, config.api_key_env.as_deref())?;

    debug!(provider = %name, base_url = %base_url, model = %config.model, "Building provider");

    // Leave headroom above the summarizer's own timeout so it reports first.
    let http_timeout = Duration::from_secs(config.timeout_secs.saturating_add(5));
    Ok(Arc::new(OpenAiCompatProvider::with_timeout(
        name,
        base_url,
        api_key,
        http_timeout,
    )))
}

fn resolve_api_key(provider: &str, key_env: Option<&str>) -> Result<String, ProviderError> {
    match key_env {
        Some(var) if !var.trim().is_empty() => std::env::var(var).map_err(|_| {
            ProviderError::NotConfigured(format!(
                "Environment variable {var} is not set (API key for '{provider}')"
            ))
        }),
        _ if requires_key(provider) => Err(ProviderError::NotConfigured(format!(
            "Provider '{provider}' needs an API key; set llm.api_key_env"
        ))),
        // Local servers accept any bearer token.
        _ => Ok(provider.to_string()),
    }
}

fn requires_key(provider: &str) -> bool {
    matches!(
        provider,
        "openai" | "openrouter" | "deepseek" | "groq" | "together" | "fireworks"
    )
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "ollama" => "http://localhost:11434/v1",
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "together" => "https://api.together.xyz/v1",
        "fireworks" => "https://api.fireworks.ai/inference/v1",
        "vllm" => "http://localhost:8000/v1",
        "lmstudio" => "http://localhost:1234/v1",
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1",
        _ => return None,
    };
    Some(url.to_string())
}
