//! `papertriage schedule` — run triage on the configured cron schedule.

use std::error::Error;
use std::path::Path;

use papertriage_config::TriageConfig;
use papertriage_core::decision::DecisionMode;
use papertriage_triage::RunError;
use papertriage_workflow::Scheduler;
use tracing::{info, warn};

use super::run::{RunArgs, build_orchestrator, print_report};

pub async fn run(config_path: &Path, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let config = TriageConfig::load_with_env(config_path)?;
    if !config.schedule.enabled {
        return Err("scheduling is disabled; set [schedule] enabled = true in the config".into());
    }

    let scheduler = Scheduler::from_config(&config.schedule)?;
    let orchestrator = build_orchestrator(&config, args)?;

    if orchestrator.context().mode == DecisionMode::Manual {
        warn!("Manual decisions: each scheduled run waits for input at this terminal");
    }

    println!("📅 Paper Triage scheduled: {}", scheduler.expression());
    if let Some(next) = scheduler.next_run() {
        println!("   Next run: {}", next.format("%Y-%m-%d %H:%M"));
    }
    println!("   Press Ctrl-C to stop.\n");

    let orchestrator = &orchestrator;
    let runs = scheduler
        .run(move || async move {
            let report = orchestrator.run_once().await?;
            print_report(&report);
            Ok::<_, RunError>(report.summary_line())
        })
        .await;

    info!(runs, "Scheduler stopped");
    Ok(())
}
