//! Structured paper summaries and the summarizer trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::DocumentRecord;
use crate::error::SummarizationError;

/// The five fields the summary prompt asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFields {
    pub problem: String,
    pub method: String,
    pub domain: String,
    pub findings: String,
    pub limitations: String,
}

impl SummaryFields {
    pub fn is_empty(&self) -> bool {
        [
            &self.problem,
            &self.method,
            &self.domain,
            &self.findings,
            &self.limitations,
        ]
        .iter()
        .all(|f| f.trim().is_empty())
    }

    /// `(label, value)` pairs in prompt order.
    pub fn labelled(&self) -> [(&'static str, &str); 5] {
        [
            ("Problem", self.problem.as_str()),
            ("Method", self.method.as_str()),
            ("Domain", self.domain.as_str()),
            ("Findings", self.findings.as_str()),
            ("Limitations", self.limitations.as_str()),
        ]
    }
}

/// A model-produced summary.
///
/// `RawOnly` means the reply could not be parsed into fields; the text is
/// kept so the log and digest still have something to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Summary {
    Structured { fields: SummaryFields, raw: String },
    RawOnly { raw: String },
}

impl Summary {
    pub fn raw(&self) -> &str {
        match self {
            Summary::Structured { raw, .. } | Summary::RawOnly { raw } => raw,
        }
    }

    pub fn fields(&self) -> Option<&SummaryFields> {
        match self {
            Summary::Structured { fields, .. } => Some(fields),
            Summary::RawOnly { .. } => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Summary::Structured { .. })
    }

    /// Single-line excerpt of at most `max_chars` characters.
    ///
    /// Structured summaries lead with problem and findings; raw replies
    /// are flattened.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let text = match self {
            Summary::Structured { fields, .. } => fields
                .labelled()
                .iter()
                .filter(|(label, value)| {
                    !value.trim().is_empty() && matches!(*label, "Problem" | "Method" | "Findings")
                })
                .map(|(label, value)| format!("{label}: {}", value.trim()))
                .collect::<Vec<_>>()
                .join(" | "),
            Summary::RawOnly { raw } => raw.clone(),
        };
        one_line(&text, max_chars)
    }
}

/// Collapse whitespace and cap at `max_chars` characters, adding `…` when cut.
pub fn one_line(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Produces a [`Summary`] from extracted text.
///
/// Implementations return `Err` only when the backend gave no usable reply
/// at all; unparseable replies become [`Summary::RawOnly`].
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        text: &str,
        document: &DocumentRecord,
    ) -> std::result::Result<Summary, SummarizationError>;
}
