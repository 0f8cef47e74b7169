//! Extractor trait — the abstraction over text-extraction backends.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ExtractionError;

/// Bounds applied to every extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionLimits {
    /// Only the first `max_pages` pages are read.
    pub max_pages: usize,
    /// Hard cap on returned characters (not bytes, not word boundaries).
    pub max_chars: usize,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_pages: 3,
            max_chars: 4000,
        }
    }
}

impl ExtractionLimits {
    /// Join the first `max_pages` pages and cut to `max_chars` characters.
    pub fn apply<'a>(&self, pages: impl IntoIterator<Item = &'a str>) -> String {
        let text = pages
            .into_iter()
            .take(self.max_pages)
            .collect::<Vec<_>>()
            .join("\n");
        truncate_chars(&text, self.max_chars)
    }
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Turns a file into plain text.
///
/// Extraction is synchronous; documents are processed one at a time.
pub trait Extractor: Send + Sync {
    /// Backend name for logs (e.g., "pdf", "text").
    fn name(&self) -> &str;

    /// Lower-case file extensions this backend handles.
    fn extensions(&self) -> &[&str];

    fn extract(
        &self,
        path: &Path,
        limits: &ExtractionLimits,
    ) -> std::result::Result<String, ExtractionError>;
}
