//! Decision Resolver — turns a prepared document into an outcome.

use std::sync::Arc;

use papertriage_core::decision::{Decision, DecisionMode, FailureStage, Outcome};
use papertriage_core::document::DocumentRecord;
use papertriage_core::prompt::{DecisionPrompt, PromptReply};
use papertriage_core::summary::Summary;
use tracing::{debug, warn};

/// What the resolver decided for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Outcome(Outcome),
    /// The human asked to stop. Nothing is recorded for this document.
    Quit,
}

/// Applies the run's decision mode.
pub struct DecisionResolver {
    mode: DecisionMode,
    prompt: Arc<dyn DecisionPrompt>,
}

impl DecisionResolver {
    /// `prompt` is only consulted in manual mode.
    pub fn new(mode: DecisionMode, prompt: Arc<dyn DecisionPrompt>) -> Self {
        Self { mode, prompt }
    }

    pub fn mode(&self) -> DecisionMode {
        self.mode
    }

    /// Resolve one document.
    ///
    /// `prepared` is the summary, or the stage and message of the failure
    /// that prevented one. Failures become error outcomes in both modes;
    /// neither the prompt nor the default action is consulted for them.
    pub async fn resolve(
        &self,
        document: &DocumentRecord,
        prepared: Result<&Summary, (FailureStage, String)>,
        dry_run: bool,
    ) -> Resolution {
        let summary = match prepared {
            Ok(summary) => summary,
            Err((stage, message)) => {
                return Resolution::Outcome(Outcome::Error {
                    stage,
                    message,
                    decision: None,
                });
            }
        };

        match self.mode {
            DecisionMode::Auto { default } => {
                Resolution::Outcome(Outcome::Decided(Decision::auto(default)))
            }
            DecisionMode::Manual => match self.prompt.ask(document, summary, dry_run).await {
                Ok(PromptReply::Decide(action)) => {
                    debug!(path = %document.path.display(), action = %action, "Manual decision");
                    Resolution::Outcome(Outcome::Decided(Decision::manual(action)))
                }
                Ok(PromptReply::Quit) => Resolution::Quit,
                Err(e) => {
                    // Never substitute a default for a human answer.
                    warn!(error = %e, "Prompt failed; stopping the run");
                    Resolution::Quit
                }
            },
        }
    }
}
