//! Audit Recorder — the append-only CSV log of every decision.
//!
//! One row per processed document per run. Rows are flushed as they are
//! written, so a crash or a quit never loses an already-recorded document.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use papertriage_core::error::AuditError;
use papertriage_core::log::LogEntry;
use tracing::debug;

pub struct AuditLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    written: usize,
}

impl AuditLog {
    /// Open `path` for appending, creating it (and its parent directory)
    /// if needed. The header row is written only to a new or empty file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        let open_error = |reason: String| AuditError::Open {
            path: path.clone(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| open_error(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| open_error(e.to_string()))?;
        let is_empty = file
            .metadata()
            .map(|m| m.len() == 0)
            .map_err(|e| open_error(e.to_string()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_empty {
            writer
                .write_record(LogEntry::COLUMNS)
                .and_then(|_| writer.flush().map_err(csv::Error::from))
                .map_err(|e| open_error(e.to_string()))?;
            debug!(path = %path.display(), "Created audit log");
        }

        Ok(Self {
            path,
            writer,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written through this handle.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Append one row and flush it to disk.
    pub fn record(&mut self, entry: &LogEntry) -> Result<(), AuditError> {
        let write_error = |reason: String| AuditError::Write {
            path: self.path.clone(),
            reason,
        };

        self.writer
            .serialize(entry)
            .map_err(|e| write_error(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| write_error(e.to_string()))?;
        self.written += 1;
        Ok(())
    }
}

/// Read every row of the log at `path`. A missing log reads as empty.
pub fn read_entries(path: &Path) -> Result<Vec<LogEntry>, AuditError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let read_error = |reason: String| AuditError::Read {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|e| read_error(e.to_string()))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| read_error(e.to_string())))
        .collect()
}

/// The last `limit` rows of the log, oldest first.
pub fn tail(path: &Path, limit: usize) -> Result<Vec<LogEntry>, AuditError> {
    let mut entries = read_entries(path)?;
    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use papertriage_core::decision::{Action, Decision, FailureStage, Outcome, OutcomeKind};
    use papertriage_core::document::DocumentRecord;
    use papertriage_core::summary::Summary;
    use tempfile::TempDir;

    fn entry(run_id: &str, name: &str, outcome: Outcome) -> LogEntry {
        let doc = DocumentRecord::from_path(format!("/in/{name}"), "/in");
        let summary = Summary::RawOnly {
            raw: "a, summary\nwith \"quotes\"".into(),
        };
        LogEntry::new(run_id, &doc, &outcome, Some(&summary), None, false)
    }

    #[test]
    fn header_written_once_and_rows_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("triage_log.csv");

        {
            let mut log = AuditLog::open(&path).unwrap();
            log.record(&entry("r1", "a.pdf", Outcome::Decided(Decision::manual(Action::Keep))))
                .unwrap();
            assert_eq!(log.written(), 1);
        }
        {
            let mut log = AuditLog::open(&path).unwrap();
            log.record(&entry("r2", "b.pdf", Outcome::Decided(Decision::auto(Action::Skip))))
                .unwrap();
        }

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.matches("timestamp,run_id,path").count(), 1);
        assert!(raw.starts_with("timestamp,run_id,path,title,decision,origin,reason"));

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].run_id, "r1");
        assert_eq!(entries[1].decision, OutcomeKind::Skip);
        assert_eq!(entries[1].reason, "auto-decision default: skip");
        assert_eq!(entries[0].summary, "a, summary with \"quotes\"");
    }

    #[test]
    fn error_rows_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let mut log = AuditLog::open(&path).unwrap();
        let outcome = Outcome::Error {
            stage: FailureStage::Summarization,
            message: "timed out".into(),
            decision: None,
        };
        log.record(&entry("r1", "c.pdf", outcome)).unwrap();

        let entries = read_entries(&path).unwrap();
        assert!(entries[0].is_error());
        assert!(entries[0].origin.is_none());
        assert_eq!(entries[0].error.as_deref(), Some("summarization: timed out"));
    }

    #[test]
    fn tail_returns_most_recent_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let mut log = AuditLog::open(&path).unwrap();
        for i in 0..5 {
            log.record(&entry(
                &format!("r{i}"),
                "p.pdf",
                Outcome::Decided(Decision::manual(Action::Keep)),
            ))
            .unwrap();
        }

        let last = tail(&path, 2).unwrap();
        assert_eq!(
            last.iter().map(|e| e.run_id.as_str()).collect::<Vec<_>>(),
            vec!["r3", "r4"]
        );
        assert_eq!(tail(&path, 50).unwrap().len(), 5);
    }

    #[test]
    fn missing_log_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_entries(&dir.path().join("none.csv")).unwrap().is_empty());
    }

    #[test]
    fn unwritable_location_fails_to_open() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be.
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        assert!(matches!(AuditLog::open(&path), Err(AuditError::Open { .. })));
    }
}
