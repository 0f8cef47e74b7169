//! LLM Provider implementations for papertriage.
//!
//! All providers implement the `papertriage_core::Provider` trait.
//! The router builds the configured provider from `[llm]` settings.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
