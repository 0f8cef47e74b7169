//! Run Orchestrator — drives one triage run from discovery to digest.
//!
//! Documents are processed strictly one after another. Every processed
//! document gets exactly one audit row before the next one starts; a quit
//! stops the loop without touching rows already written.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use papertriage_config::{ConfigError, RunContext};
use papertriage_core::decision::{FailureStage, Outcome, OutcomeKind};
use papertriage_core::document::DocumentRecord;
use papertriage_core::error::{AuditError, DiscoveryError};
use papertriage_core::extract::Extractor;
use papertriage_core::log::LogEntry;
use papertriage_core::notify::{DigestMessage, Notifier};
use papertriage_core::prompt::DecisionPrompt;
use papertriage_core::summary::{Summarizer, Summary};
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::Archiver;
use crate::audit::AuditLog;
use crate::decision::{DecisionResolver, Resolution};
use crate::digest::{DigestInput, render_digest, write_digest};
use crate::discovery::discover;

/// Failures that end a run. Everything per-document is recorded instead.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Audit log error: {0}")]
    Audit(#[from] AuditError),
}

/// What happened to the digest email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Email disabled, no notifier, or nothing to report.
    NotAttempted,
    Sent,
    Failed(String),
}

/// The result of one run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub discovered: usize,
    pub counts: BTreeMap<OutcomeKind, usize>,
    pub quit_early: bool,
    pub discovery_errors: Vec<DiscoveryError>,
    pub digest_path: Option<PathBuf>,
    pub digest_error: Option<String>,
    pub dispatch: DispatchStatus,
    /// Rows written this run, in processing order.
    pub entries: Vec<LogEntry>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// One line for the terminal.
    pub fn summary_line(&self) -> String {
        if self.discovered == 0 {
            return format!("Run {}: no papers found", self.run_id);
        }

        let counts = OutcomeKind::ALL
            .iter()
            .map(|kind| format!("{kind} {}", self.count(*kind)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut line = format!(
            "Run {}: {}/{} papers processed ({counts})",
            self.run_id,
            self.processed(),
            self.discovered
        );
        if self.dry_run {
            line.push_str(" [dry run]");
        }
        if self.quit_early {
            line.push_str(", stopped early");
        }
        if let Some(path) = &self.digest_path {
            line.push_str(&format!(", digest: {}", path.display()));
        }
        match &self.dispatch {
            DispatchStatus::Sent => line.push_str(", digest emailed"),
            DispatchStatus::Failed(e) => line.push_str(&format!(", email failed: {e}")),
            DispatchStatus::NotAttempted => {}
        }
        line
    }
}

/// Wires the pipeline stages together for one `RunContext`.
pub struct Orchestrator {
    context: RunContext,
    extractor: Arc<dyn Extractor>,
    summarizer: Arc<dyn Summarizer>,
    resolver: DecisionResolver,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Orchestrator {
    pub fn new(
        context: RunContext,
        extractor: Arc<dyn Extractor>,
        summarizer: Arc<dyn Summarizer>,
        prompt: Arc<dyn DecisionPrompt>,
    ) -> Self {
        let resolver = DecisionResolver::new(context.mode, prompt);
        Self {
            context,
            extractor,
            summarizer,
            resolver,
            notifier: None,
        }
    }

    /// Deliver digests through `notifier` when email is enabled.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run the whole pipeline once.
    pub async fn run_once(&self) -> Result<RunReport, RunError> {
        let ctx = &self.context;
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        info!(
            run_id = %run_id,
            mode = %ctx.mode,
            dry_run = ctx.dry_run,
            folders = ctx.input_folders.len(),
            "Starting triage run"
        );

        let mut audit = AuditLog::open(&ctx.log_path)?;
        let archiver = Archiver::new(ctx.archive_dir.clone());

        let discovered = discover(
            &ctx.input_folders,
            &ctx.extensions,
            &ctx.metadata_sources,
            Some(&ctx.archive_dir),
        );

        let mut report = RunReport {
            run_id: run_id.clone(),
            started_at,
            dry_run: ctx.dry_run,
            discovered: discovered.records.len(),
            counts: BTreeMap::new(),
            quit_early: false,
            discovery_errors: discovered.errors,
            digest_path: None,
            digest_error: None,
            dispatch: DispatchStatus::NotAttempted,
            entries: Vec::new(),
        };

        for document in &discovered.records {
            let Some(entry) = self.process(&run_id, document, &archiver).await else {
                info!(run_id = %run_id, "Run stopped by user");
                report.quit_early = true;
                break;
            };

            audit.record(&entry)?;
            *report.counts.entry(entry.decision).or_insert(0) += 1;
            report.entries.push(entry);
        }

        if report.entries.is_empty() {
            info!(run_id = %run_id, "Nothing processed; no digest");
            return Ok(report);
        }
        if report.quit_early && !ctx.digest.on_early_exit {
            info!(run_id = %run_id, "Skipping digest after early exit");
            return Ok(report);
        }

        self.finish(&mut report).await;
        Ok(report)
    }

    /// Extract, summarize, decide and archive one document.
    /// `None` means the human quit.
    async fn process(
        &self,
        run_id: &str,
        document: &DocumentRecord,
        archiver: &Archiver,
    ) -> Option<LogEntry> {
        let ctx = &self.context;

        let prepared: Result<Summary, (FailureStage, String)> =
            match self.extractor.extract(&document.path, &ctx.limits) {
                Err(e) => {
                    warn!(path = %document.path.display(), error = %e, "Extraction failed");
                    Err((FailureStage::Extraction, e.to_string()))
                }
                Ok(text) => self
                    .summarizer
                    .summarize(&text, document)
                    .await
                    .map_err(|e| {
                        warn!(path = %document.path.display(), error = %e, "Summarization failed");
                        (FailureStage::Summarization, e.to_string())
                    }),
            };

        let resolution = self
            .resolver
            .resolve(document, prepared.as_ref().map_err(|f| f.clone()), ctx.dry_run)
            .await;

        let mut outcome = match resolution {
            Resolution::Quit => return None,
            Resolution::Outcome(outcome) => outcome,
        };

        let mut archived_to = None;
        if let Outcome::Decided(decision) = &outcome {
            match archiver.apply(&document.path, decision.action, ctx.dry_run) {
                Ok(done) => {
                    archived_to = done.destination().map(|p| p.display().to_string());
                }
                Err(e) => {
                    warn!(path = %document.path.display(), error = %e, "Archive failed");
                    outcome = Outcome::Error {
                        stage: FailureStage::Archive,
                        message: e.to_string(),
                        decision: Some(decision.clone()),
                    };
                }
            }
        }

        let entry = LogEntry::new(
            run_id,
            document,
            &outcome,
            prepared.as_ref().ok(),
            archived_to,
            ctx.dry_run,
        );
        info!(
            path = %document.path.display(),
            decision = %entry.decision,
            "Processed"
        );
        Some(entry)
    }

    /// Render, write and dispatch the digest. Failures are reported, never
    /// fatal.
    async fn finish(&self, report: &mut RunReport) {
        let ctx = &self.context;
        let body = render_digest(&DigestInput {
            run_id: &report.run_id,
            started_at: report.started_at,
            mode: ctx.mode,
            dry_run: ctx.dry_run,
            quit_early: report.quit_early,
            entries: &report.entries,
        });

        if ctx.digest.enabled {
            match write_digest(&ctx.digest.dir, report.started_at, &body) {
                Ok(path) => {
                    info!(path = %path.display(), "Digest written");
                    report.digest_path = Some(path);
                }
                Err(e) => {
                    warn!(dir = %ctx.digest.dir.display(), error = %e, "Could not write digest");
                    report.digest_error = Some(e.to_string());
                }
            }
        }

        let Some(notifier) = self.notifier.as_ref().filter(|_| ctx.email_enabled) else {
            return;
        };
        let message = DigestMessage {
            body,
            attachment: report.digest_path.clone(),
            entry_count: report.entries.len(),
        };
        report.dispatch = match notifier.dispatch(&message).await {
            Ok(()) => DispatchStatus::Sent,
            Err(e) => {
                warn!(channel = notifier.name(), error = %e, "Digest dispatch failed");
                DispatchStatus::Failed(e.to_string())
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use papertriage_config::{DigestSettings, MetadataSource};
    use papertriage_core::decision::{Action, DecisionMode};
    use papertriage_core::error::{
        DispatchError, ExtractionError, PromptError, SummarizationError,
    };
    use papertriage_core::extract::ExtractionLimits;
    use papertriage_core::prompt::PromptReply;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Reads the file as text; files named `broken*` fail.
    struct FakeExtractor {
        seen_limits: Mutex<Vec<ExtractionLimits>>,
    }

    impl FakeExtractor {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen_limits: Mutex::new(Vec::new()),
            })
        }
    }

    impl Extractor for FakeExtractor {
        fn name(&self) -> &str {
            "fake"
        }

        fn extensions(&self) -> &[&str] {
            &["pdf"]
        }

        fn extract(
            &self,
            path: &Path,
            limits: &ExtractionLimits,
        ) -> Result<String, ExtractionError> {
            self.seen_limits.lock().unwrap().push(*limits);
            let name = path.file_name().unwrap().to_string_lossy();
            if name.starts_with("broken") {
                return Err(ExtractionError::Parse {
                    path: path.to_path_buf(),
                    reason: "encrypted".into(),
                });
            }
            Ok(fs::read_to_string(path).unwrap_or_default())
        }
    }

    /// Echoes the text; text containing `slow` fails.
    struct FakeSummarizer;

    #[async_trait]
    impl Summarizer for FakeSummarizer {
        async fn summarize(
            &self,
            text: &str,
            _document: &DocumentRecord,
        ) -> Result<Summary, SummarizationError> {
            if text.contains("slow") {
                return Err(SummarizationError::Timeout { timeout_secs: 1 });
            }
            Ok(Summary::RawOnly {
                raw: format!("about {text}"),
            })
        }
    }

    struct ScriptedPrompt {
        replies: Mutex<Vec<PromptReply>>,
        calls: Mutex<usize>,
    }

    impl ScriptedPrompt {
        fn new(mut replies: Vec<PromptReply>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DecisionPrompt for ScriptedPrompt {
        async fn ask(
            &self,
            _document: &DocumentRecord,
            _summary: &Summary,
            _dry_run: bool,
        ) -> Result<PromptReply, PromptError> {
            *self.calls.lock().unwrap() += 1;
            self.replies.lock().unwrap().pop().ok_or(PromptError::Closed)
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<DigestMessage>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn dispatch(&self, digest: &DigestMessage) -> Result<(), DispatchError> {
            self.sent.lock().unwrap().push(digest.clone());
            if self.fail {
                return Err(DispatchError::Transport("smtp down".into()));
            }
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new(papers: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            let inbox = dir.path().join("inbox");
            fs::create_dir_all(&inbox).unwrap();
            for (name, text) in papers {
                fs::write(inbox.join(name), text).unwrap();
            }
            Self { dir }
        }

        fn inbox(&self) -> PathBuf {
            self.dir.path().join("inbox")
        }

        fn archive(&self) -> PathBuf {
            self.dir.path().join("archive")
        }

        fn log(&self) -> PathBuf {
            self.dir.path().join("triage_log.csv")
        }

        fn digests(&self) -> PathBuf {
            self.dir.path().join("digests")
        }

        fn context(&self, mode: DecisionMode, dry_run: bool) -> RunContext {
            RunContext {
                input_folders: vec![self.inbox()],
                extensions: vec!["pdf".into()],
                metadata_sources: Vec::<MetadataSource>::new(),
                limits: ExtractionLimits {
                    max_pages: 2,
                    max_chars: 500,
                },
                mode,
                archive_dir: self.archive(),
                log_path: self.log(),
                digest: DigestSettings {
                    enabled: true,
                    dir: self.digests(),
                    on_early_exit: true,
                },
                dry_run,
                email_enabled: false,
            }
        }

        fn log_rows(&self) -> Vec<LogEntry> {
            crate::audit::read_entries(&self.log()).unwrap()
        }
    }

    fn auto(action: Action) -> DecisionMode {
        DecisionMode::Auto { default: action }
    }

    fn orchestrator(ctx: RunContext, prompt: Arc<ScriptedPrompt>) -> Orchestrator {
        Orchestrator::new(ctx, FakeExtractor::new(), Arc::new(FakeSummarizer), prompt)
    }

    #[tokio::test]
    async fn every_document_gets_exactly_one_row() {
        let fx = Fixture::new(&[
            ("a.pdf", "alpha"),
            ("broken.pdf", ""),
            ("c.pdf", "slow text"),
            ("d.pdf", "delta"),
        ]);
        let prompt = ScriptedPrompt::new(vec![]);
        let report = orchestrator(fx.context(auto(Action::Keep), false), prompt.clone())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.discovered, 4);
        assert_eq!(report.processed(), 4);
        assert_eq!(report.count(OutcomeKind::Keep), 2);
        assert_eq!(report.count(OutcomeKind::Error), 2);
        assert_eq!(prompt.calls(), 0);

        let rows = fx.log_rows();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.run_id == report.run_id));
        assert!(rows[1].error.as_deref().unwrap().starts_with("extraction:"));
        assert!(rows[1].error.as_deref().unwrap().contains("encrypted"));
        assert!(rows[2].error.as_deref().unwrap().starts_with("summarization:"));
        assert!(rows[1].origin.is_none());
    }

    #[tokio::test]
    async fn dry_run_leaves_files_in_place() {
        let fx = Fixture::new(&[("a.pdf", "alpha"), ("b.pdf", "beta")]);
        let report = orchestrator(
            fx.context(auto(Action::Remove), true),
            ScriptedPrompt::new(vec![]),
        )
        .run_once()
        .await
        .unwrap();

        assert_eq!(report.count(OutcomeKind::Remove), 2);
        assert!(fx.inbox().join("a.pdf").exists());
        assert!(fx.inbox().join("b.pdf").exists());
        assert!(!fx.archive().exists());

        let rows = fx.log_rows();
        assert!(rows.iter().all(|r| r.dry_run));
        assert!(rows[0].archived_to.as_deref().unwrap().ends_with("a.pdf"));
    }

    #[tokio::test]
    async fn dry_run_gives_same_named_papers_distinct_destinations() {
        let fx = Fixture::new(&[("paper.pdf", "alpha")]);
        let other = fx.dir.path().join("other");
        fs::create_dir_all(&other).unwrap();
        fs::write(other.join("paper.pdf"), "beta").unwrap();

        let mut ctx = fx.context(auto(Action::Remove), true);
        ctx.input_folders.push(other);
        let orch = orchestrator(ctx, ScriptedPrompt::new(vec![]));

        for _ in 0..2 {
            let report = orch.run_once().await.unwrap();
            let targets: Vec<&str> = report
                .entries
                .iter()
                .map(|e| e.archived_to.as_deref().unwrap())
                .collect();
            assert_eq!(targets.len(), 2);
            assert!(targets[0].ends_with("paper.pdf"));
            assert!(targets[1].ends_with("paper-1.pdf"));
        }
        assert!(!fx.archive().exists());
    }

    #[tokio::test]
    async fn second_run_finds_nothing_left_to_remove() {
        let fx = Fixture::new(&[("a.pdf", "alpha"), ("b.pdf", "beta")]);

        let first = orchestrator(
            fx.context(auto(Action::Remove), false),
            ScriptedPrompt::new(vec![]),
        )
        .run_once()
        .await
        .unwrap();
        assert_eq!(first.count(OutcomeKind::Remove), 2);
        assert!(fx.archive().join("a.pdf").exists());
        assert!(!fx.inbox().join("a.pdf").exists());

        let second = orchestrator(
            fx.context(auto(Action::Remove), false),
            ScriptedPrompt::new(vec![]),
        )
        .run_once()
        .await
        .unwrap();
        assert_eq!(second.discovered, 0);
        assert!(second.digest_path.is_none());
        assert_eq!(fs::read_dir(fx.archive()).unwrap().count(), 2);
        assert_eq!(fx.log_rows().len(), 2);
    }

    #[tokio::test]
    async fn quit_keeps_processed_rows_and_still_writes_digest() {
        let fx = Fixture::new(&[("a.pdf", "alpha"), ("b.pdf", "beta"), ("c.pdf", "gamma")]);
        let prompt = ScriptedPrompt::new(vec![
            PromptReply::Decide(Action::Remove),
            PromptReply::Quit,
        ]);
        let report = orchestrator(fx.context(DecisionMode::Manual, false), prompt.clone())
            .run_once()
            .await
            .unwrap();

        assert!(report.quit_early);
        assert_eq!(report.processed(), 1);
        assert_eq!(prompt.calls(), 2);
        assert_eq!(fx.log_rows().len(), 1);
        assert!(fx.inbox().join("b.pdf").exists());

        let digest = fs::read_to_string(report.digest_path.as_ref().unwrap()).unwrap();
        assert!(digest.contains("Stopped early"));
        assert!(report.summary_line().contains("stopped early"));
    }

    #[tokio::test]
    async fn quit_without_digest_when_disabled_for_early_exit() {
        let fx = Fixture::new(&[("a.pdf", "alpha"), ("b.pdf", "beta")]);
        let mut ctx = fx.context(DecisionMode::Manual, false);
        ctx.digest.on_early_exit = false;
        let prompt = ScriptedPrompt::new(vec![PromptReply::Decide(Action::Keep)]);

        // Prompt runs dry after one answer: closed input quits.
        let report = orchestrator(ctx, prompt).run_once().await.unwrap();
        assert!(report.quit_early);
        assert_eq!(report.processed(), 1);
        assert!(report.digest_path.is_none());
        assert!(!fx.digests().exists());
    }

    #[tokio::test]
    async fn errors_never_reach_the_prompt() {
        let fx = Fixture::new(&[("broken.pdf", ""), ("ok.pdf", "fine")]);
        let prompt = ScriptedPrompt::new(vec![PromptReply::Decide(Action::Skip)]);
        let report = orchestrator(fx.context(DecisionMode::Manual, false), prompt.clone())
            .run_once()
            .await
            .unwrap();

        assert_eq!(prompt.calls(), 1);
        assert_eq!(report.count(OutcomeKind::Error), 1);
        assert_eq!(report.count(OutcomeKind::Skip), 1);
        assert!(!report.quit_early);
    }

    #[tokio::test]
    async fn limits_are_passed_to_the_extractor() {
        let fx = Fixture::new(&[("a.pdf", "alpha")]);
        let extractor = FakeExtractor::new();
        let orchestrator = Orchestrator::new(
            fx.context(auto(Action::Skip), false),
            extractor.clone(),
            Arc::new(FakeSummarizer),
            ScriptedPrompt::new(vec![]),
        );
        orchestrator.run_once().await.unwrap();

        let seen = extractor.seen_limits.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[ExtractionLimits {
                max_pages: 2,
                max_chars: 500
            }]
        );
    }

    #[tokio::test]
    async fn same_named_papers_are_both_archived() {
        let fx = Fixture::new(&[]);
        let other = fx.dir.path().join("other");
        fs::create_dir_all(fx.inbox().join("sub")).unwrap();
        fs::create_dir_all(&other).unwrap();
        fs::write(fx.inbox().join("sub").join("paper.pdf"), "one").unwrap();
        fs::write(other.join("paper.pdf"), "two").unwrap();

        let mut ctx = fx.context(auto(Action::Remove), false);
        ctx.input_folders.push(other);
        let report = orchestrator(ctx, ScriptedPrompt::new(vec![]))
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.count(OutcomeKind::Remove), 2);
        assert_eq!(fs::read_to_string(fx.archive().join("paper.pdf")).unwrap(), "one");
        assert_eq!(fs::read_to_string(fx.archive().join("paper-1.pdf")).unwrap(), "two");
    }

    #[tokio::test]
    async fn email_gets_digest_and_failures_are_reported() {
        let fx = Fixture::new(&[("a.pdf", "alpha")]);
        let mut ctx = fx.context(auto(Action::Keep), false);
        ctx.email_enabled = true;

        let notifier = RecordingNotifier::new(false);
        let report = orchestrator(ctx.clone(), ScriptedPrompt::new(vec![]))
            .with_notifier(notifier.clone())
            .run_once()
            .await
            .unwrap();
        assert_eq!(report.dispatch, DispatchStatus::Sent);
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Paper Triage Digest"));
        assert_eq!(sent[0].attachment, report.digest_path);

        let failing = RecordingNotifier::new(true);
        let report = orchestrator(ctx, ScriptedPrompt::new(vec![]))
            .with_notifier(failing)
            .run_once()
            .await
            .unwrap();
        assert!(matches!(report.dispatch, DispatchStatus::Failed(_)));
        // Delivery problems never touch the log.
        assert_eq!(fx.log_rows().len(), 2);
    }

    #[tokio::test]
    async fn empty_run_sends_nothing() {
        let fx = Fixture::new(&[]);
        let mut ctx = fx.context(auto(Action::Keep), false);
        ctx.email_enabled = true;
        let notifier = RecordingNotifier::new(false);

        let report = orchestrator(ctx, ScriptedPrompt::new(vec![]))
            .with_notifier(notifier.clone())
            .run_once()
            .await
            .unwrap();
        assert_eq!(report.dispatch, DispatchStatus::NotAttempted);
        assert!(notifier.sent.lock().unwrap().is_empty());
        assert!(report.summary_line().contains("no papers found"));
    }

    #[tokio::test]
    async fn unwritable_log_aborts_the_run() {
        let fx = Fixture::new(&[("a.pdf", "alpha")]);
        let mut ctx = fx.context(auto(Action::Remove), false);
        fs::create_dir_all(fx.dir.path().join("taken")).unwrap();
        ctx.log_path = fx.dir.path().join("taken");

        let result = orchestrator(ctx, ScriptedPrompt::new(vec![])).run_once().await;
        assert!(matches!(result, Err(RunError::Audit(_))));
        assert!(fx.inbox().join("a.pdf").exists());
    }
}
