//! Summarizer Adapter — asks an LLM for a five-field paper summary.
//!
//! The model is asked for a JSON object. Replies that are not JSON are
//! scanned for labelled lines (`Problem: ...`); anything else is kept as a
//! raw summary rather than failing the document.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use papertriage_config::LlmConfig;
use papertriage_core::document::DocumentRecord;
use papertriage_core::error::SummarizationError;
use papertriage_core::message::Message;
use papertriage_core::provider::{Provider, ProviderRequest};
use papertriage_core::summary::{Summarizer, Summary, SummaryFields};
use serde_json::Value;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str =
    "You help researchers triage papers. Keep answers terse and factual.";

const INSTRUCTIONS: &str = "Summarize this academic paper. Describe the problem, the \
method or approach, the dataset or domain context, the key findings or implications, \
and any notable limitations or future work. Reply with a single JSON object with the \
string keys \"problem\", \"method\", \"domain\", \"findings\" and \"limitations\", one \
or two short sentences each. Do not add any other text.";

/// LLM-backed summarizer.
pub struct LlmSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &LlmConfig) -> Self {
        Self::new(provider, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(&self, text: &str, document: &DocumentRecord) -> ProviderRequest {
        let mut request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(user_prompt(text, document)),
            ],
        );
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }
}

/// Build the user prompt, grounded with whatever bibliographic data we have.
pub fn user_prompt(text: &str, document: &DocumentRecord) -> String {
    let mut prompt = String::from(INSTRUCTIONS);
    prompt.push_str("\n\n");
    prompt.push_str(&format!("Title: {}\n", document.title()));
    if let Some(authors) = document.authors() {
        prompt.push_str(&format!("Authors: {authors}\n"));
    }
    prompt.push_str("\nPaper text:\n");
    prompt.push_str(text);
    prompt
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        text: &str,
        document: &DocumentRecord,
    ) -> Result<Summary, SummarizationError> {
        let request = self.request(text, document);

        debug!(
            provider = self.provider.name(),
            model = %self.model,
            chars = text.chars().count(),
            "Requesting summary"
        );

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| SummarizationError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })??;

        let summary = parse_reply(&response.message.content)?;
        if !summary.is_structured() {
            warn!(path = %document.path.display(), "Summary reply was not structured");
        }
        Ok(summary)
    }
}

/// Interpret a model reply.
pub fn parse_reply(reply: &str) -> Result<Summary, SummarizationError> {
    let raw = reply.trim();
    if raw.is_empty() {
        return Err(SummarizationError::EmptyReply);
    }

    let fields = parse_json_fields(raw)
        .or_else(|| parse_labelled_lines(raw))
        .filter(|f| !f.is_empty());

    Ok(match fields {
        Some(fields) => Summary::Structured {
            fields,
            raw: raw.to_string(),
        },
        None => Summary::RawOnly {
            raw: raw.to_string(),
        },
    })
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after = &text[start + 3..];
    // Skip the language tag line (```json).
    let body = after.find('\n').map(|i| &after[i + 1..]).unwrap_or(after);
    match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    }
}

fn parse_json_fields(text: &str) -> Option<SummaryFields> {
    let body = strip_code_fence(text);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }

    let value: Value = serde_json::from_str(&body[start..=end]).ok()?;
    let object = value.as_object()?;

    let mut fields = SummaryFields::default();
    for (key, value) in object {
        if let Some(slot) = field_slot(&mut fields, key) {
            *slot = json_text(value);
        }
    }
    Some(fields)
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(json_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Map a key or label to the field it fills. Accepts a few common synonyms.
fn field_slot<'a>(fields: &'a mut SummaryFields, key: &str) -> Option<&'a mut String> {
    let key = key.trim().to_lowercase();
    let slot = match key.as_str() {
        "problem" => &mut fields.problem,
        "method" | "approach" | "methods" => &mut fields.method,
        "domain" | "dataset" | "context" => &mut fields.domain,
        "findings" | "key findings" | "results" => &mut fields.findings,
        "limitations" | "limitation" | "future work" => &mut fields.limitations,
        _ => return None,
    };
    Some(slot)
}

fn parse_labelled_lines(text: &str) -> Option<SummaryFields> {
    let mut fields = SummaryFields::default();
    let mut current: Option<String> = None;
    let mut found = false;

    for line in text.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(['-', '*', '#', '•', ' '])
            .replace("**", "");
        if cleaned.is_empty() {
            continue;
        }

        if let Some((label, rest)) = cleaned.split_once(':') {
            if let Some(slot) = field_slot(&mut fields, label) {
                *slot = rest.trim().to_string();
                current = Some(label.to_string());
                found = true;
                continue;
            }
        }

        // Continuation of the previous labelled field.
        if let Some(label) = &current {
            if let Some(slot) = field_slot(&mut fields, label) {
                if !slot.is_empty() {
                    slot.push(' ');
                }
                slot.push_str(&cleaned);
            }
        }
    }

    found.then_some(fields)
}
