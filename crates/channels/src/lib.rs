//! Human-facing channels for papertriage.
//!
//! - **Prompt** — interactive keep/remove/skip decisions in the terminal
//! - **Email** — SMTP delivery of the run digest

pub mod email;
pub mod prompt;

pub use email::EmailNotifier;
pub use prompt::{LinePrompt, TerminalPrompt, render_card};
