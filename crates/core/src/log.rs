//! Audit log rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::{Origin, Outcome, OutcomeKind};
use crate::document::DocumentRecord;
use crate::summary::Summary;

/// Maximum characters of summary text stored per row.
pub const SUMMARY_EXCERPT_CHARS: usize = 280;

/// One row of the audit log. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub path: String,
    pub title: String,
    pub decision: OutcomeKind,
    pub origin: Option<Origin>,
    pub reason: String,
    pub dry_run: bool,
    pub archived_to: Option<String>,
    pub summary: String,
    pub error: Option<String>,
}

impl LogEntry {
    pub const COLUMNS: [&'static str; 11] = [
        "timestamp",
        "run_id",
        "path",
        "title",
        "decision",
        "origin",
        "reason",
        "dry_run",
        "archived_to",
        "summary",
        "error",
    ];

    pub fn new(
        run_id: &str,
        document: &DocumentRecord,
        outcome: &Outcome,
        summary: Option<&Summary>,
        archived_to: Option<String>,
        dry_run: bool,
    ) -> Self {
        let decision = outcome.decision();
        Self {
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            path: document.path.display().to_string(),
            title: document.title(),
            decision: outcome.kind(),
            origin: decision.map(|d| d.origin),
            reason: decision.map(|d| d.reason.clone()).unwrap_or_default(),
            dry_run,
            archived_to,
            summary: summary
                .map(|s| s.excerpt(SUMMARY_EXCERPT_CHARS))
                .unwrap_or_default(),
            error: outcome.error_message(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.decision == OutcomeKind::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Action, Decision, FailureStage};

    #[test]
    fn entry_from_decided_outcome() {
        let doc = DocumentRecord::from_path("/in/paper.pdf", "/in");
        let outcome = Outcome::Decided(Decision::auto(Action::Remove));
        let summary = Summary::RawOnly { raw: "short".into() };
        let entry = LogEntry::new(
            "run-1",
            &doc,
            &outcome,
            Some(&summary),
            Some("/archive/paper.pdf".into()),
            false,
        );

        assert_eq!(entry.decision, OutcomeKind::Remove);
        assert_eq!(entry.origin, Some(Origin::Auto));
        assert_eq!(entry.title, "paper");
        assert_eq!(entry.summary, "short");
        assert!(entry.error.is_none());
    }

    #[test]
    fn entry_from_error_outcome_has_no_origin() {
        let doc = DocumentRecord::from_path("/in/broken.pdf", "/in");
        let outcome = Outcome::Error {
            stage: FailureStage::Extraction,
            message: "no text".into(),
            decision: None,
        };
        let entry = LogEntry::new("run-1", &doc, &outcome, None, None, true);
        assert!(entry.is_error());
        assert!(entry.origin.is_none());
        assert_eq!(entry.error.as_deref(), Some("extraction: no text"));
    }
}
