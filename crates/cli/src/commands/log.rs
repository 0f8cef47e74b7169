//! `papertriage log` — show the most recent audit rows.

use std::error::Error;
use std::path::Path;

use papertriage_config::{TriageConfig, expand_tilde};
use papertriage_core::log::LogEntry;
use papertriage_core::summary::one_line;
use papertriage_triage::audit;

pub fn run(config_path: &Path, limit: usize) -> Result<(), Box<dyn Error>> {
    let config = TriageConfig::load_with_env(config_path)?;
    let log_path = expand_tilde(&config.log_path);

    let entries = audit::tail(&log_path, limit)?;
    if entries.is_empty() {
        println!("No audit entries in {}", log_path.display());
        return Ok(());
    }

    println!("📜 Last {} of {}\n", entries.len(), log_path.display());
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "{}  {:<6}  {}",
        entry.timestamp.format("%Y-%m-%d %H:%M"),
        entry.decision.to_string(),
        entry.title
    );
    if entry.dry_run {
        line.push_str("  [dry run]");
    }
    if let Some(to) = &entry.archived_to {
        line.push_str(&format!("\n                    → {to}"));
    }
    if let Some(error) = &entry.error {
        line.push_str(&format!("\n                    ✗ {}", one_line(error, 120)));
    }
    line
}
