//! Triage decisions and per-document outcomes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What to do with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Keep,
    Skip,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Keep => "keep",
            Action::Skip => "skip",
            Action::Remove => "remove",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    /// Accepts full names and the single-letter prompt shortcuts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" | "k" => Ok(Action::Keep),
            "skip" | "s" => Ok(Action::Skip),
            "remove" | "r" => Ok(Action::Remove),
            other => Err(format!(
                "Unsupported decision '{other}' (expected keep, skip or remove)"
            )),
        }
    }
}

/// Who made the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Manual,
    Auto,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Manual => "manual",
            Origin::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub origin: Origin,
    /// Free text; empty for manual decisions.
    #[serde(default)]
    pub reason: String,
}

impl Decision {
    pub fn manual(action: Action) -> Self {
        Self {
            action,
            origin: Origin::Manual,
            reason: String::new(),
        }
    }

    pub fn auto(action: Action) -> Self {
        Self {
            action,
            origin: Origin::Auto,
            reason: format!("auto-decision default: {action}"),
        }
    }
}

/// How decisions are made for a whole run. Fixed before the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DecisionMode {
    /// Ask a human for every document.
    Manual,
    /// Apply `default` to every document without asking.
    Auto { default: Action },
}

impl DecisionMode {
    pub fn is_auto(&self) -> bool {
        matches!(self, DecisionMode::Auto { .. })
    }
}

impl std::fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionMode::Manual => f.write_str("manual"),
            DecisionMode::Auto { default } => write!(f, "auto ({default})"),
        }
    }
}

/// The pipeline stage a document failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Extraction,
    Summarization,
    Archive,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailureStage::Extraction => "extraction",
            FailureStage::Summarization => "summarization",
            FailureStage::Archive => "archive",
        })
    }
}

/// The logged result for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Decided(Decision),
    /// The pipeline failed; no filesystem action was taken.
    /// `decision` is kept when the failure came after deciding (archive).
    Error {
        stage: FailureStage,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decision: Option<Decision>,
    },
}

/// Digest/log grouping key: the three actions plus `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Remove,
    Keep,
    Skip,
    Error,
}

impl OutcomeKind {
    /// Fixed section order used in digests.
    pub const ALL: [OutcomeKind; 4] = [
        OutcomeKind::Remove,
        OutcomeKind::Keep,
        OutcomeKind::Skip,
        OutcomeKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Remove => "remove",
            OutcomeKind::Keep => "keep",
            OutcomeKind::Skip => "skip",
            OutcomeKind::Error => "error",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "error" => Ok(OutcomeKind::Error),
            other => other.parse::<Action>().map(OutcomeKind::from),
        }
    }
}

impl From<Action> for OutcomeKind {
    fn from(action: Action) -> Self {
        match action {
            Action::Keep => OutcomeKind::Keep,
            Action::Skip => OutcomeKind::Skip,
            Action::Remove => OutcomeKind::Remove,
        }
    }
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Decided(d) => d.action.into(),
            Outcome::Error { .. } => OutcomeKind::Error,
        }
    }

    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Outcome::Decided(d) => Some(d),
            Outcome::Error { decision, .. } => decision.as_ref(),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Outcome::Decided(_) => None,
            Outcome::Error { stage, message, .. } => Some(format!("{stage}: {message}")),
        }
    }
}
