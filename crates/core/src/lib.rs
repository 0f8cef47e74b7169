//! # papertriage core
//!
//! Domain types, traits, and error definitions for the paper triage
//! pipeline. This crate has no I/O of its own — it defines the model that
//! the other crates implement against.
//!
//! Every external collaborator (extraction backend, LLM, human prompt,
//! notification channel) is a trait here, so the pipeline can be driven by
//! real backends or by test doubles.

pub mod decision;
pub mod document;
pub mod error;
pub mod extract;
pub mod log;
pub mod message;
pub mod notify;
pub mod prompt;
pub mod provider;
pub mod summary;

// Re-export key types at crate root for ergonomics
pub use decision::{Action, Decision, DecisionMode, FailureStage, Origin, Outcome, OutcomeKind};
pub use document::{DocumentRecord, Metadata};
pub use error::{Error, Result};
pub use extract::{ExtractionLimits, Extractor};
pub use log::LogEntry;
pub use message::{Message, Role};
pub use notify::{DigestMessage, Notifier};
pub use prompt::{DecisionPrompt, PromptReply};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use summary::{Summarizer, Summary, SummaryFields};
