//! Digest Builder — a markdown report of one run.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use papertriage_core::decision::{DecisionMode, OutcomeKind};
use papertriage_core::log::LogEntry;
use papertriage_core::summary::one_line;

/// Characters of summary shown per digest line.
const DIGEST_SUMMARY_CHARS: usize = 200;

/// Everything the renderer needs. Entries are in processing order.
#[derive(Debug, Clone)]
pub struct DigestInput<'a> {
    pub run_id: &'a str,
    pub started_at: DateTime<Utc>,
    pub mode: DecisionMode,
    pub dry_run: bool,
    pub quit_early: bool,
    pub entries: &'a [LogEntry],
}

/// Render the digest. Same input, same output.
pub fn render_digest(input: &DigestInput<'_>) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "# Paper Triage Digest\n");
    let _ = writeln!(out, "- Run: `{}`", input.run_id);
    let _ = writeln!(
        out,
        "- Started: {}",
        input.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "- Decisions: {}", input.mode);
    if input.dry_run {
        let _ = writeln!(out, "- Dry run: no files were moved");
    }
    if input.quit_early {
        let _ = writeln!(out, "- Stopped early: remaining papers were not processed");
    }
    let _ = writeln!(out, "- Papers processed: {}\n", input.entries.len());

    let _ = writeln!(out, "| Decision | Count |");
    let _ = writeln!(out, "|---|---|");
    for kind in OutcomeKind::ALL {
        let _ = writeln!(out, "| {kind} | {} |", count(input.entries, kind));
    }

    for kind in OutcomeKind::ALL {
        let _ = writeln!(out, "\n## {} ({})\n", heading(kind), count(input.entries, kind));
        let mut any = false;
        for entry in input.entries.iter().filter(|e| e.decision == kind) {
            any = true;
            render_entry(&mut out, entry, input.dry_run);
        }
        if !any {
            let _ = writeln!(out, "_None._");
        }
    }

    out
}

fn count(entries: &[LogEntry], kind: OutcomeKind) -> usize {
    entries.iter().filter(|e| e.decision == kind).count()
}

fn heading(kind: OutcomeKind) -> &'static str {
    match kind {
        OutcomeKind::Remove => "Removed",
        OutcomeKind::Keep => "Kept",
        OutcomeKind::Skip => "Skipped",
        OutcomeKind::Error => "Errors",
    }
}

fn render_entry(out: &mut String, entry: &LogEntry, dry_run: bool) {
    let _ = writeln!(out, "- **{}** (`{}`)", entry.title, entry.path);

    if let Some(to) = &entry.archived_to {
        let verb = if dry_run { "would move to" } else { "moved to" };
        let _ = writeln!(out, "  - {verb} `{to}`");
    }
    if let Some(error) = &entry.error {
        let _ = writeln!(out, "  - error: {}", one_line(error, DIGEST_SUMMARY_CHARS));
    }
    if !entry.summary.is_empty() {
        let _ = writeln!(out, "  - {}", one_line(&entry.summary, DIGEST_SUMMARY_CHARS));
    }
}

/// Write `body` to `dir/digest-YYYYMMDD-HHMMSS.md`, never replacing an
/// existing file (a counter suffix is added instead).
pub fn write_digest(dir: &Path, started_at: DateTime<Utc>, body: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stem = format!("digest-{}", started_at.format("%Y%m%d-%H%M%S"));

    for n in 0u32.. {
        let name = if n == 0 {
            format!("{stem}.md")
        } else {
            format!("{stem}-{n}.md")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(body.as_bytes())?;
                file.flush()?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::other("no free digest file name"))
}
