//! Extractor Adapter — turns papers into bounded plain text.

use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use papertriage_core::error::ExtractionError;
use papertriage_core::extract::{ExtractionLimits, Extractor};
use tracing::{debug, warn};

/// Page separator honoured in text files.
const FORM_FEED: char = '\x0C';

/// Split plain text into pages on form feeds.
pub fn split_pages(text: &str) -> Vec<&str> {
    text.split(FORM_FEED).collect()
}

fn bounded<'a>(
    path: &Path,
    pages: impl IntoIterator<Item = &'a str>,
    limits: &ExtractionLimits,
) -> Result<String, ExtractionError> {
    let out = limits.apply(pages);
    if out.trim().is_empty() {
        return Err(ExtractionError::NoText {
            path: path.to_path_buf(),
        });
    }
    Ok(out)
}

/// PDF backend built on `pdf-extract`.
#[derive(Debug, Default)]
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract(&self, path: &Path, limits: &ExtractionLimits) -> Result<String, ExtractionError> {
        let bytes = fs::read(path).map_err(|e| ExtractionError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // The backend panics on some malformed fonts.
        let pages = match catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })) {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "PDF extraction failed");
                return Err(ExtractionError::Parse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(path = %path.display(), "PDF extraction panicked");
                return Err(ExtractionError::Parse {
                    path: path.to_path_buf(),
                    reason: "extraction backend panicked (malformed fonts?)".into(),
                });
            }
        };

        debug!(path = %path.display(), pages = pages.len(), "Extracted PDF text");
        bounded(path, pages.iter().map(String::as_str), limits)
    }
}

/// Plain text and markdown backend. A file without form feeds is one page.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "text"
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "md"]
    }

    fn extract(&self, path: &Path, limits: &ExtractionLimits) -> Result<String, ExtractionError> {
        let bytes = fs::read(path).map_err(|e| ExtractionError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let text = String::from_utf8_lossy(&bytes);
        bounded(path, split_pages(&text), limits)
    }
}

/// Dispatches to the backend registered for a file's extension.
pub struct ExtractorRegistry {
    backends: Vec<Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// PDF plus plain text.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PdfExtractor));
        registry.register(Box::new(PlainTextExtractor));
        registry
    }

    /// Later registrations take precedence for shared extensions.
    pub fn register(&mut self, backend: Box<dyn Extractor>) {
        self.backends.insert(0, backend);
    }

    pub fn for_path(&self, path: &Path) -> Option<&dyn Extractor> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        self.backends
            .iter()
            .find(|b| b.extensions().contains(&ext.as_str()))
            .map(|b| b.as_ref())
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Extractor for ExtractorRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    fn extensions(&self) -> &[&str] {
        &[]
    }

    fn extract(&self, path: &Path, limits: &ExtractionLimits) -> Result<String, ExtractionError> {
        let backend = self
            .for_path(path)
            .ok_or_else(|| ExtractionError::Unsupported {
                path: path.to_path_buf(),
            })?;
        backend.extract(path, limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn limits(max_pages: usize, max_chars: usize) -> ExtractionLimits {
        ExtractionLimits {
            max_pages,
            max_chars,
        }
    }

    #[test]
    fn split_on_form_feed() {
        assert_eq!(split_pages("a\x0Cb\x0Cc"), vec!["a", "b", "c"]);
        assert_eq!(split_pages("single"), vec!["single"]);
    }

    #[test]
    fn text_extraction_respects_page_and_char_limits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "page one\x0Cpage two\x0Cpage three").unwrap();

        let out = PlainTextExtractor.extract(&path, &limits(2, 100)).unwrap();
        assert_eq!(out, "page one\npage two");

        let out = PlainTextExtractor.extract(&path, &limits(3, 6)).unwrap();
        assert_eq!(out.chars().count(), 6);
        assert_eq!(out, "page o");
    }

    /// A PDF with one Helvetica text line per page.
    fn write_pdf(path: &Path, pages: &[&str]) {
        let n = pages.len();
        let font_id = 3 + 2 * n;
        let mut objects = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {n} >>",
                (0..n)
                    .map(|i| format!("{} 0 R", 3 + 2 * i))
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
        ];
        for (i, text) in pages.iter().enumerate() {
            let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 {font_id} 0 R >> >> /Contents {} 0 R >>",
                4 + 2 * i
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{content}\nendstream",
                content.len()
            ));
        }
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".into());

        let mut pdf = String::from("%PDF-1.4\n");
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
        }
        let xref = pdf.len();
        pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            pdf.push_str(&format!("{offset:010} 00000 n \n"));
        }
        pdf.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        ));
        fs::write(path, pdf).unwrap();
    }

    #[test]
    fn pdf_extraction_stops_at_page_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paper.pdf");
        write_pdf(&path, &["PAGEONE alpha", "PAGETWO beta", "PAGETHREE gamma"]);

        let one = PdfExtractor.extract(&path, &limits(1, 4000)).unwrap();
        assert!(one.contains("PAGEONE"));
        assert!(!one.contains("PAGETWO"));

        let two = PdfExtractor.extract(&path, &limits(2, 4000)).unwrap();
        assert!(two.contains("PAGETWO"));
        assert!(!two.contains("PAGETHREE"));

        let short = PdfExtractor.extract(&path, &limits(3, 5)).unwrap();
        assert!(short.chars().count() <= 5);
    }

    #[test]
    fn blank_file_has_no_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.md");
        fs::write(&path, "  \n\x0C \n").unwrap();
        assert!(matches!(
            PlainTextExtractor.extract(&path, &limits(3, 100)),
            Err(ExtractionError::NoText { .. })
        ));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = PdfExtractor
            .extract(Path::new("/definitely/not/here.pdf"), &limits(3, 100))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Unreadable { .. }));
    }

    #[test]
    fn garbage_pdf_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"this is not a pdf at all").unwrap();
        assert!(matches!(
            PdfExtractor.extract(&path, &limits(3, 100)),
            Err(ExtractionError::Parse { .. })
        ));
    }

    #[test]
    fn registry_dispatches_by_extension() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(
            registry.for_path(Path::new("a/B.PDF")).map(|b| b.name()),
            Some("pdf")
        );
        assert_eq!(
            registry.for_path(Path::new("readme.md")).map(|b| b.name()),
            Some("text")
        );
        assert!(registry.for_path(Path::new("scan.djvu")).is_none());
        assert!(matches!(
            registry.extract(Path::new("scan.djvu"), &limits(1, 1)),
            Err(ExtractionError::Unsupported { .. })
        ));
    }
}
