//! Archiver — applies `remove` decisions by moving files aside.
//!
//! Nothing is ever deleted or overwritten. `keep` and `skip` leave the
//! filesystem alone, and a dry run only reports where a file would go.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use papertriage_core::decision::Action;
use papertriage_core::error::ArchiveError;
use tracing::{info, warn};

/// What the archiver did (or would have done) with one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// `keep` / `skip`.
    Untouched,
    Moved { to: PathBuf },
    /// Dry run: the destination a real run would use.
    WouldMove { to: PathBuf },
}

impl ArchiveOutcome {
    pub fn destination(&self) -> Option<&Path> {
        match self {
            ArchiveOutcome::Untouched => None,
            ArchiveOutcome::Moved { to } | ArchiveOutcome::WouldMove { to } => Some(to),
        }
    }
}

/// One archiver serves one run: destinations handed out during the run
/// stay reserved, so dry-run reports never collide.
pub struct Archiver {
    dir: PathBuf,
    claimed: Mutex<HashSet<PathBuf>>,
}

impl Archiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn apply(
        &self,
        path: &Path,
        action: Action,
        dry_run: bool,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        if action != Action::Remove {
            return Ok(ArchiveOutcome::Untouched);
        }
        if !path.is_file() {
            return Err(ArchiveError::Missing {
                path: path.to_path_buf(),
            });
        }
        let file_name = path.file_name().ok_or_else(|| ArchiveError::Missing {
            path: path.to_path_buf(),
        })?;

        if dry_run {
            let to = self.claim(Path::new(file_name));
            return Ok(ArchiveOutcome::WouldMove { to });
        }

        fs::create_dir_all(&self.dir).map_err(|e| ArchiveError::CreateDir {
            path: self.dir.clone(),
            reason: e.to_string(),
        })?;

        let to = self.claim(Path::new(file_name));
        move_file(path, &to)?;
        info!(from = %path.display(), to = %to.display(), "Archived");
        Ok(ArchiveOutcome::Moved { to })
    }

    /// Pick a free destination and reserve it for the rest of the run.
    fn claim(&self, file_name: &Path) -> PathBuf {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        let to = pick_target(&self.dir, file_name, |p| claimed.contains(p));
        claimed.insert(to.clone());
        to
    }
}

/// First free name in `dir` for `file_name`: `paper.pdf`, then
/// `paper-1.pdf`, `paper-2.pdf`, …
pub fn unique_target(dir: &Path, file_name: &Path) -> PathBuf {
    pick_target(dir, file_name, |_| false)
}

fn pick_target(dir: &Path, file_name: &Path, reserved: impl Fn(&Path) -> bool) -> PathBuf {
    let taken = |p: &Path| p.exists() || reserved(p);
    let candidate = dir.join(file_name);
    if !taken(&candidate) {
        return candidate;
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|n| dir.join(format!("{stem}-{n}{ext}")))
        .find(|p| !taken(p.as_path()))
        .unwrap_or(candidate)
}

fn move_file(from: &Path, to: &Path) -> Result<(), ArchiveError> {
    let move_error = |e: io::Error| ArchiveError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        reason: e.to_string(),
    };

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(move_error)?;
            if let Err(e) = fs::remove_file(from) {
                // Leave exactly one copy behind.
                if let Err(cleanup) = fs::remove_file(to) {
                    warn!(path = %to.display(), error = %cleanup, "Could not roll back archive copy");
                }
                return Err(move_error(e));
            }
            Ok(())
        }
        Err(e) => Err(move_error(e)),
    }
}
