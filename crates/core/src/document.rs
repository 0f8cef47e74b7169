//! Discovered documents and their merged metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Open-ended metadata map. Keys are lower-case field names.
pub type Metadata = BTreeMap<String, String>;

/// Field keys with a fixed meaning across sources.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const AUTHORS: &str = "authors";
    pub const YEAR: &str = "year";
    pub const SOURCE: &str = "source";
    pub const FOLDER: &str = "folder";
    pub const FILE_NAME: &str = "file_name";
}

/// One candidate file found during discovery.
///
/// Built by the metadata merger and treated as read-only for the rest of
/// the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub path: PathBuf,
    pub source_folder: PathBuf,
    pub metadata: Metadata,
}

impl DocumentRecord {
    /// Create a record carrying only the folder-derived fields
    /// (lowest precedence: any metadata source overrides them).
    pub fn from_path(path: impl Into<PathBuf>, source_folder: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source_folder = source_folder.into();
        let mut metadata = Metadata::new();

        if let Some(stem) = path.file_stem() {
            metadata.insert(fields::TITLE.into(), stem.to_string_lossy().into_owned());
        }
        if let Some(name) = path.file_name() {
            metadata.insert(fields::FILE_NAME.into(), name.to_string_lossy().into_owned());
        }
        metadata.insert(
            fields::FOLDER.into(),
            source_folder.to_string_lossy().into_owned(),
        );

        Self {
            path,
            source_folder,
            metadata,
        }
    }

    /// Overlay `fields` onto this record; incoming values win.
    /// Empty values are ignored so a blank column never erases data.
    pub fn merge_fields(&mut self, incoming: &Metadata) {
        for (key, value) in incoming {
            if value.trim().is_empty() {
                continue;
            }
            self.metadata.insert(key.to_lowercase(), value.trim().to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// The merged title, falling back to the file name.
    pub fn title(&self) -> String {
        self.get(fields::TITLE)
            .map(str::to_string)
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn authors(&self) -> Option<&str> {
        self.get(fields::AUTHORS)
    }

    /// Lower-cased file name, used as the primary metadata match key.
    pub fn file_key(&self) -> Option<String> {
        file_key(&self.path)
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Lower-cased file name of `path`.
pub fn file_key(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_lowercase())
}

/// Normalise a title for matching: lower-case, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
