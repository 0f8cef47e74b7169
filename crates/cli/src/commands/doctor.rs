//! `papertriage doctor` — Diagnose configuration and connectivity.

use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::time::Duration;

use papertriage_config::{TriageConfig, expand_tilde};
use papertriage_providers::build_from_config;
use papertriage_workflow::CronExpr;

const LLM_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(config_path: &Path) -> Result<(), Box<dyn Error>> {
    println!("🩺 Paper Triage Doctor — Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    if !config_path.exists() {
        println!("  ⚠️  No config file at {} — run `papertriage init`", config_path.display());
        issues += 1;
    }
    let config = match TriageConfig::load_with_env(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config file before running.");
            return Ok(());
        }
    };

    issues += check_folders(&config);
    issues += check_log_path(&expand_tilde(&config.log_path));
    issues += check_schedule(&config);
    issues += check_llm(&config).await;
    issues += check_email(&config);

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

fn check_folders(config: &TriageConfig) -> usize {
    let mut issues = 0;

    if config.input_folders.is_empty() {
        println!("  ⚠️  No input_folders configured (runs need --input)");
        issues += 1;
    }
    for folder in &config.input_folders {
        let path = expand_tilde(folder);
        if path.is_dir() {
            println!("  ✅ Input folder: {}", path.display());
        } else {
            println!("  ❌ Input folder missing: {}", path.display());
            issues += 1;
        }
    }
    for source in &config.metadata_sources {
        let path = expand_tilde(&source.path);
        if path.is_file() {
            println!("  ✅ Metadata source ({}): {}", source.kind, path.display());
        } else {
            println!("  ⚠️  Metadata source ({}) missing: {}", source.kind, path.display());
            issues += 1;
        }
    }

    issues
}

fn check_log_path(path: &Path) -> usize {
    if path.exists() {
        return match OpenOptions::new().append(true).open(path) {
            Ok(_) => {
                println!("  ✅ Audit log writable: {}", path.display());
                0
            }
            Err(e) => {
                println!("  ❌ Audit log not writable ({e}): {}", path.display());
                1
            }
        };
    }

    // Created on the first run; the nearest existing ancestor must be a directory.
    let ancestor = path.ancestors().skip(1).find(|p| p.exists());
    match ancestor {
        Some(dir) if dir.is_dir() => {
            println!("  ✅ Audit log will be created at: {}", path.display());
            0
        }
        _ => {
            println!("  ❌ Audit log location unusable: {}", path.display());
            1
        }
    }
}

fn check_schedule(config: &TriageConfig) -> usize {
    let expression = config.schedule.cron_expression();
    match CronExpr::parse(&expression) {
        Ok(expr) => {
            let state = if config.schedule.enabled { "enabled" } else { "disabled" };
            println!("  ✅ Schedule `{expr}` ({state})");
            0
        }
        Err(e) => {
            println!("  ❌ Schedule invalid: {e}");
            1
        }
    }
}

async fn check_llm(config: &TriageConfig) -> usize {
    let provider = match build_from_config(&config.llm) {
        Ok(provider) => provider,
        Err(e) => {
            println!("  ❌ LLM provider '{}': {e}", config.llm.provider);
            return 1;
        }
    };

    match tokio::time::timeout(LLM_CHECK_TIMEOUT, provider.health_check()).await {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => {
            println!("  ❌ LLM endpoint for '{}' answered with an error", config.llm.provider);
            return 1;
        }
        Ok(Err(e)) => {
            println!("  ❌ LLM endpoint unreachable: {e}");
            return 1;
        }
        Err(_) => {
            println!("  ❌ LLM endpoint did not answer within {}s", LLM_CHECK_TIMEOUT.as_secs());
            return 1;
        }
    }
    println!("  ✅ LLM endpoint reachable ({})", config.llm.provider);

    match provider.list_models().await {
        Ok(models) if models.iter().any(|m| m == &config.llm.model) => {
            println!("  ✅ Model available: {}", config.llm.model);
            0
        }
        Ok(models) if models.is_empty() => {
            println!("  ⚠️  Could not list models; assuming '{}' exists", config.llm.model);
            0
        }
        Ok(_) => {
            println!("  ⚠️  Model '{}' not offered by the endpoint", config.llm.model);
            1
        }
        Err(e) => {
            println!("  ⚠️  Could not list models: {e}");
            0
        }
    }
}

fn check_email(config: &TriageConfig) -> usize {
    if !config.email.enabled {
        println!("  ✅ Email digest disabled");
        return 0;
    }

    match &config.email.password_env {
        Some(var) if std::env::var(var).is_err() => {
            println!("  ❌ Email enabled but ${var} is not set");
            1
        }
        _ => {
            println!(
                "  ✅ Email via {}:{} to {} recipient(s)",
                config.email.smtp_host,
                config.email.smtp_port,
                config.email.recipients.len()
            );
            0
        }
    }
}
