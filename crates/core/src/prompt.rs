//! DecisionPrompt trait — how a human is asked for a decision.

use async_trait::async_trait;

use crate::decision::Action;
use crate::document::DocumentRecord;
use crate::error::PromptError;
use crate::summary::Summary;

/// A human's answer for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptReply {
    Decide(Action),
    /// Stop the run; documents already processed stay logged.
    Quit,
}

/// Front end for manual decisions. Blocks until the human answers.
#[async_trait]
pub trait DecisionPrompt: Send + Sync {
    async fn ask(
        &self,
        document: &DocumentRecord,
        summary: &Summary,
        dry_run: bool,
    ) -> std::result::Result<PromptReply, PromptError>;
}
