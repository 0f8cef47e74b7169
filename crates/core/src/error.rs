//! Error types for the papertriage domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each pipeline stage has its own error type so the orchestrator can tell
//! recoverable per-document failures apart from fatal ones.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for papertriage operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Summarization error: {0}")]
    Summarization(#[from] SummarizationError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Stage errors ---

/// A metadata source could not be used. Scoped to that one source.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("Metadata source not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Unknown metadata source type '{kind}' for {path}")]
    UnknownSourceType { kind: String, path: PathBuf },

    #[error("Malformed metadata source {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Cannot read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Cannot parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("No extractable text in {path}")]
    NoText { path: PathBuf },

    #[error("Unsupported file type: {path}")]
    Unsupported { path: PathBuf },
}

#[derive(Debug, Clone, Error)]
pub enum SummarizationError {
    #[error("Summarizer timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Summarizer backend unavailable: {0}")]
    Unavailable(#[from] ProviderError),

    #[error("Summarizer returned an empty reply")]
    EmptyReply,
}

#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    #[error("Failed to create archive directory {path}: {reason}")]
    CreateDir { path: PathBuf, reason: String },

    #[error("Failed to move {from} to {to}: {reason}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Source file is gone: {path}")]
    Missing { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to open audit log {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Failed to write audit log {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Failed to read audit log {path}: {reason}")]
    Read { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Notification channel not configured: {0}")]
    NotConfigured(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Failed to build message: {0}")]
    InvalidMessage(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt input closed")]
    Closed,

    #[error("Prompt I/O error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 503,
            message: "model loading".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model loading"));
    }

    #[test]
    fn summarization_wraps_provider_error() {
        let err: SummarizationError = ProviderError::Network("connection refused".into()).into();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn archive_error_names_both_paths() {
        let err = ArchiveError::Move {
            from: "/in/paper.pdf".into(),
            to: "/archive/paper.pdf".into(),
            reason: "permission denied".into(),
        };
        let text = err.to_string();
        assert!(text.contains("/in/paper.pdf"));
        assert!(text.contains("/archive/paper.pdf"));
    }
}
