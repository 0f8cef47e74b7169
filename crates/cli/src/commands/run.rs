//! `papertriage run` — one triage pass over the input folders.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::Args;
use papertriage_channels::{EmailNotifier, TerminalPrompt};
use papertriage_config::{RunContext, RunOverrides, TriageConfig};
use papertriage_core::decision::Action;
use papertriage_providers::build_from_config;
use papertriage_triage::{ExtractorRegistry, LlmSummarizer, Orchestrator, RunReport};

/// Flags shared by `run` and `schedule`. Each one overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Decide and log as usual, but never move files
    #[arg(long)]
    pub dry_run: bool,

    /// Pages of text sent to the model per paper
    #[arg(long, value_name = "N")]
    pub max_pages: Option<usize>,

    /// Characters of text sent to the model per paper
    #[arg(long, value_name = "N")]
    pub max_chars: Option<usize>,

    /// Apply this decision to every paper without prompting
    #[arg(long, value_name = "keep|skip|remove")]
    pub auto_decision: Option<Action>,

    /// Prompt for every paper even if auto-decision is configured
    #[arg(long)]
    pub interactive: bool,

    /// Archive directory for removed papers
    #[arg(long, value_name = "DIR")]
    pub archive: Option<String>,

    /// Audit log CSV file
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<String>,

    /// Directory for digest files
    #[arg(long, value_name = "DIR")]
    pub digest_dir: Option<String>,

    /// Input folder (repeatable; replaces the configured folders)
    #[arg(long = "input", value_name = "DIR")]
    pub inputs: Vec<String>,

    /// Do not email the digest
    #[arg(long)]
    pub no_email: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            dry_run: self.dry_run,
            max_pages: self.max_pages,
            max_chars: self.max_chars,
            auto_decision: self.auto_decision,
            interactive: self.interactive,
            archive_dir: self.archive.clone(),
            log_path: self.log_path.clone(),
            digest_dir: self.digest_dir.clone(),
            input_folders: self.inputs.clone(),
            no_email: self.no_email,
        }
    }
}

/// Wire the real pipeline: PDF/text extraction, the configured LLM, the
/// terminal prompt and (when enabled) SMTP delivery.
pub fn build_orchestrator(
    config: &TriageConfig,
    args: &RunArgs,
) -> Result<Orchestrator, Box<dyn Error>> {
    let context = RunContext::resolve(config, &args.overrides())?;
    let provider = build_from_config(&config.llm)?;
    let summarizer = LlmSummarizer::from_config(provider, &config.llm);

    let email_enabled = context.email_enabled;
    let mut orchestrator = Orchestrator::new(
        context,
        Arc::new(ExtractorRegistry::with_defaults()),
        Arc::new(summarizer),
        Arc::new(TerminalPrompt::stdio()),
    );
    if email_enabled {
        orchestrator =
            orchestrator.with_notifier(Arc::new(EmailNotifier::new(config.email.clone())));
    }
    Ok(orchestrator)
}

pub fn print_report(report: &RunReport) {
    for error in &report.discovery_errors {
        eprintln!("  ⚠️  {error}");
    }
    if let Some(error) = &report.digest_error {
        eprintln!("  ⚠️  Digest not written: {error}");
    }
    println!("{}", report.summary_line());
}

pub async fn run(config_path: &Path, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let config = TriageConfig::load_with_env(config_path)?;
    let orchestrator = build_orchestrator(&config, args)?;

    let report = orchestrator.run_once().await?;
    print_report(&report);

    Ok(())
}
