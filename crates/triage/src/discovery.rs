//! Metadata Merger — finds candidate papers and enriches them with
//! reference-manager metadata.
//!
//! Folder-derived fields (`title`, `file_name`, `folder`) are the base
//! layer. Each metadata source is applied on top in declaration order, so
//! the last source to mention a field wins.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use papertriage_config::MetadataSource;
use papertriage_core::document::{self, DocumentRecord, Metadata, fields};
use papertriage_core::error::DiscoveryError;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Attachment columns tried in order for reference-manager exports.
const ATTACHMENT_COLUMNS: [&str; 4] = ["File Attachments", "Attachments", "file", "path"];

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Candidate papers in processing order.
    pub records: Vec<DocumentRecord>,
    /// One entry per metadata source that could not be used.
    pub errors: Vec<DiscoveryError>,
}

/// One entry read from a metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Lower-cased file name of the referenced attachment.
    pub file_key: Option<String>,
    pub fields: Metadata,
}

impl SourceEntry {
    fn title_key(&self) -> Option<String> {
        self.fields
            .get(fields::TITLE)
            .map(|t| document::normalize_title(t))
            .filter(|t| !t.is_empty())
    }
}

/// Walk `folders` and merge metadata from `sources`.
///
/// Files under `exclude` (the archive directory) are never returned.
pub fn discover(
    folders: &[PathBuf],
    extensions: &[String],
    sources: &[MetadataSource],
    exclude: Option<&Path>,
) -> Discovered {
    let mut records = walk_folders(folders, extensions, exclude);
    let mut errors = Vec::new();

    for source in sources {
        match load_source(source) {
            Ok(entries) => {
                let matched = apply_source(&mut records, &entries);
                debug!(
                    source = %source.path.display(),
                    entries = entries.len(),
                    matched,
                    "Applied metadata source"
                );
            }
            Err(e) => {
                warn!(source = %source.path.display(), error = %e, "Skipping metadata source");
                errors.push(e);
            }
        }
    }

    info!(
        documents = records.len(),
        source_errors = errors.len(),
        "Discovery finished"
    );

    Discovered { records, errors }
}

fn walk_folders(
    folders: &[PathBuf],
    extensions: &[String],
    exclude: Option<&Path>,
) -> Vec<DocumentRecord> {
    let wanted: HashSet<String> = extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    let excluded = exclude.and_then(|p| p.canonicalize().ok());

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for folder in folders {
        let mut found: Vec<PathBuf> = Vec::new();

        let walker = WalkDir::new(folder).follow_links(false).into_iter();
        let walker = walker.filter_entry(|entry| {
            !(entry.file_type().is_dir() && is_excluded(entry.path(), excluded.as_deref()))
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(folder = %folder.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let matches_ext = entry
                .path()
                .extension()
                .map(|ext| wanted.contains(&ext.to_string_lossy().to_lowercase()))
                .unwrap_or(false);
            if matches_ext {
                found.push(entry.into_path());
            }
        }

        found.sort();
        for path in found {
            let key = path.canonicalize().unwrap_or_else(|_| path.clone());
            if seen.insert(key) {
                records.push(DocumentRecord::from_path(path, folder.clone()));
            }
        }
    }

    records
}

fn is_excluded(dir: &Path, excluded: Option<&Path>) -> bool {
    let Some(excluded) = excluded else {
        return false;
    };
    dir.canonicalize()
        .map(|canonical| canonical == excluded)
        .unwrap_or(false)
}

/// Overlay one source's entries onto the records. Returns how many records
/// picked up at least one entry.
fn apply_source(records: &mut [DocumentRecord], entries: &[SourceEntry]) -> usize {
    // Later entries in the same source win, like later sources do.
    let mut by_file: HashMap<String, Metadata> = HashMap::new();
    let mut by_title: HashMap<String, Metadata> = HashMap::new();

    // An entry with both keys is also a title fallback when its path is stale.
    for entry in entries {
        if let Some(file_key) = &entry.file_key {
            by_file
                .entry(file_key.clone())
                .or_default()
                .extend(entry.fields.clone());
        }
        if let Some(title_key) = entry.title_key() {
            by_title
                .entry(title_key)
                .or_default()
                .extend(entry.fields.clone());
        }
    }

    let mut matched = 0;
    for record in records.iter_mut() {
        let hit = record
            .file_key()
            .and_then(|key| by_file.get(&key))
            .or_else(|| by_title.get(&document::normalize_title(&record.title())));
        if let Some(found) = hit {
            record.merge_fields(found);
            matched += 1;
        }
    }
    matched
}

/// Read a metadata source into entries.
pub fn load_source(source: &MetadataSource) -> Result<Vec<SourceEntry>, DiscoveryError> {
    let path = &source.path;
    if !path.exists() {
        return Err(DiscoveryError::SourceNotFound { path: path.clone() });
    }

    match source.kind.trim().to_lowercase().as_str() {
        "bookmarks" => {
            let raw = fs::read_to_string(path).map_err(|e| DiscoveryError::Io {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            parse_bookmarks(&raw, path)
        }
        "zotero" | "mendeley" => {
            let raw = fs::read_to_string(path).map_err(|e| DiscoveryError::Io {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            parse_reference_export(&raw, path)
        }
        other => Err(DiscoveryError::UnknownSourceType {
            kind: other.to_string(),
            path: path.clone(),
        }),
    }
}

/// Parse a bookmarks JSON file: either a bare array or `{"bookmarks": [...]}`.
pub fn parse_bookmarks(raw: &str, origin: &Path) -> Result<Vec<SourceEntry>, DiscoveryError> {
    let malformed = |reason: String| DiscoveryError::Malformed {
        path: origin.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("bookmarks") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err(malformed("\"bookmarks\" is not an array".into())),
            None => return Err(malformed("expected an array or a \"bookmarks\" key".into())),
        },
        _ => return Err(malformed("expected an array or a \"bookmarks\" key".into())),
    };

    let mut entries = Vec::new();
    for item in items {
        let Value::Object(map) = item else {
            continue;
        };

        let mut entry_fields = Metadata::new();
        let mut file_ref = None;
        for (key, value) in map {
            let Some(text) = value.as_str().map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            match key.as_str() {
                "path" | "file" => {
                    file_ref.get_or_insert_with(|| text.to_string());
                }
                other => {
                    entry_fields.insert(other.to_lowercase(), text.to_string());
                }
            }
        }
        entry_fields.insert(fields::SOURCE.into(), origin.display().to_string());

        let file_key = file_ref.as_deref().and_then(|f| document::file_key(Path::new(f)));
        if file_key.is_none() && !entry_fields.contains_key(fields::TITLE) {
            continue;
        }
        entries.push(SourceEntry {
            file_key,
            fields: entry_fields,
        });
    }

    Ok(entries)
}

/// Parse a Zotero/Mendeley CSV export.
pub fn parse_reference_export(
    raw: &str,
    origin: &Path,
) -> Result<Vec<SourceEntry>, DiscoveryError> {
    let malformed = |reason: String| DiscoveryError::Malformed {
        path: origin.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(raw.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| malformed(e.to_string()))?
        .clone();
    let column = |names: &[&str]| -> Option<usize> {
        names
            .iter()
            .find_map(|name| headers.iter().position(|h| h.trim() == *name))
    };

    let attachment_cols: Vec<usize> = ATTACHMENT_COLUMNS
        .iter()
        .filter_map(|name| column(&[name]))
        .collect();
    let title_col = column(&["Title", "title"]);
    let authors_col = column(&["Author", "Authors"]);
    let year_col = column(&["Year"]);

    let mut entries = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| malformed(e.to_string()))?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        // First non-empty attachment column; first `;`-separated element.
        let attachment = attachment_cols
            .iter()
            .find_map(|&i| cell(Some(i)))
            .and_then(|a| a.split(';').next().map(|s| s.trim().to_string()))
            .filter(|a| !a.is_empty());
        let file_key = attachment
            .as_deref()
            .and_then(|a| document::file_key(Path::new(a)));

        let mut entry_fields = Metadata::new();
        if let Some(title) = cell(title_col) {
            entry_fields.insert(fields::TITLE.into(), title);
        }
        if let Some(authors) = cell(authors_col) {
            entry_fields.insert(fields::AUTHORS.into(), authors);
        }
        if let Some(year) = cell(year_col) {
            entry_fields.insert(fields::YEAR.into(), year);
        }
        entry_fields.insert(fields::SOURCE.into(), origin.display().to_string());

        if file_key.is_none() && !entry_fields.contains_key(fields::TITLE) {
            continue;
        }
        entries.push(SourceEntry {
            file_key,
            fields: entry_fields,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"%PDF-1.4").unwrap();
        path
    }

    fn source(kind: &str, path: &Path) -> MetadataSource {
        MetadataSource {
            kind: kind.into(),
            path: path.to_path_buf(),
        }
    }

    fn pdf_only() -> Vec<String> {
        vec!["pdf".into()]
    }

    #[test]
    fn walk_filters_extensions_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "b.pdf");
        touch(dir.path(), "a.PDF");
        touch(dir.path(), "nested/c.pdf");
        touch(dir.path(), "notes.txt");

        let found = discover(&[dir.path().to_path_buf()], &pdf_only(), &[], None);
        let names: Vec<_> = found
            .records
            .iter()
            .map(|r| r.get(fields::FILE_NAME).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "c.pdf"]);
        assert!(found.errors.is_empty());
    }

    #[test]
    fn duplicate_folders_are_collapsed() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "paper.pdf");
        let folders = vec![dir.path().to_path_buf(), dir.path().to_path_buf()];
        let found = discover(&folders, &pdf_only(), &[], None);
        assert_eq!(found.records.len(), 1);
    }

    #[test]
    fn archive_directory_is_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "inbox.pdf");
        touch(dir.path(), "archive/old.pdf");
        let archive = dir.path().join("archive");

        let found = discover(
            &[dir.path().to_path_buf()],
            &pdf_only(),
            &[],
            Some(&archive),
        );
        assert_eq!(found.records.len(), 1);
        assert_eq!(found.records[0].title(), "inbox");
    }

    #[test]
    fn later_sources_override_earlier_ones() {
        let dir = TempDir::new().unwrap();
        let papers = dir.path().join("papers");
        touch(&papers, "attention.pdf");

        let bookmarks = dir.path().join("bookmarks.json");
        fs::write(
            &bookmarks,
            r#"{"bookmarks": [{"path": "/elsewhere/Attention.pdf", "title": "From bookmarks", "tags": "nlp"}]}"#,
        )
        .unwrap();
        let zotero = dir.path().join("zotero.csv");
        fs::write(
            &zotero,
            "Title,Author,Year,File Attachments\n\
             Attention Is All You Need,Vaswani,2017,/lib/attention.pdf; /lib/supp.pdf\n",
        )
        .unwrap();

        let found = discover(
            &[papers],
            &pdf_only(),
            &[source("bookmarks", &bookmarks), source("zotero", &zotero)],
            None,
        );
        let record = &found.records[0];
        assert_eq!(record.title(), "Attention Is All You Need");
        assert_eq!(record.authors(), Some("Vaswani"));
        assert_eq!(record.get(fields::YEAR), Some("2017"));
        // Fields only the earlier source knows survive.
        assert_eq!(record.get("tags"), Some("nlp"));
        assert_eq!(
            record.get(fields::SOURCE),
            Some(zotero.display().to_string().as_str())
        );
    }

    #[test]
    fn title_only_entries_match_by_normalised_title() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Deep   Learning.pdf");
        let bookmarks = dir.path().join("b.json");
        fs::write(
            &bookmarks,
            r#"[{"title": "deep learning", "year": "2015"}]"#,
        )
        .unwrap();

        let found = discover(
            &[dir.path().to_path_buf()],
            &pdf_only(),
            &[source("bookmarks", &bookmarks)],
            None,
        );
        assert_eq!(found.records[0].get(fields::YEAR), Some("2015"));
    }

    #[test]
    fn stale_file_reference_falls_back_to_title() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "Deep Learning.pdf");
        let bookmarks = dir.path().join("b.json");
        fs::write(
            &bookmarks,
            r#"[{"file": "old/deep-learning-v1.pdf", "title": "Deep Learning", "year": "2015"}]"#,
        )
        .unwrap();

        let found = discover(
            &[dir.path().to_path_buf()],
            &pdf_only(),
            &[source("bookmarks", &bookmarks)],
            None,
        );
        assert_eq!(found.records[0].get(fields::YEAR), Some("2015"));
    }

    #[test]
    fn broken_sources_are_reported_but_do_not_stop_discovery() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "paper.pdf");
        let bad_json = dir.path().join("bad.json");
        fs::write(&bad_json, "{not json").unwrap();
        let good = dir.path().join("good.json");
        fs::write(&good, r#"[{"file": "paper.pdf", "title": "Good"}]"#).unwrap();

        let found = discover(
            &[dir.path().to_path_buf()],
            &pdf_only(),
            &[
                source("bookmarks", &bad_json),
                source("bookmarks", &dir.path().join("missing.json")),
                source("endnote", &good),
                source("bookmarks", &good),
            ],
            None,
        );

        assert_eq!(found.records.len(), 1);
        assert_eq!(found.records[0].title(), "Good");
        assert_eq!(found.errors.len(), 3);
        assert!(matches!(found.errors[0], DiscoveryError::Malformed { .. }));
        assert!(matches!(found.errors[1], DiscoveryError::SourceNotFound { .. }));
        assert!(matches!(
            found.errors[2],
            DiscoveryError::UnknownSourceType { .. }
        ));
    }

    #[test]
    fn reference_export_uses_fallback_attachment_columns() {
        let raw = "title,Authors,path\nA Study,Doe,/x/Study.PDF\n,,\n";
        let entries = parse_reference_export(raw, Path::new("m.csv")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_key.as_deref(), Some("study.pdf"));
        assert_eq!(
            entries[0].fields.get(fields::AUTHORS).map(String::as_str),
            Some("Doe")
        );
    }

    #[test]
    fn bookmarks_without_reference_or_title_are_dropped() {
        let entries = parse_bookmarks(r#"[{"tags": "x"}, 3, {"file": "a.pdf"}]"#, Path::new("b"))
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_key.as_deref(), Some("a.pdf"));
    }
}
