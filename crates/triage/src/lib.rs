//! The paper triage pipeline.
//!
//! One run walks the input folders, merges metadata, then for each paper:
//! extract → summarize → decide → archive → log. A digest of the run is
//! rendered at the end and handed to the notifier.

pub mod archive;
pub mod audit;
pub mod decision;
pub mod digest;
pub mod discovery;
pub mod extract;
pub mod orchestrator;
pub mod summarize;

pub use archive::{ArchiveOutcome, Archiver};
pub use audit::AuditLog;
pub use decision::{DecisionResolver, Resolution};
pub use digest::{DigestInput, render_digest, write_digest};
pub use discovery::{Discovered, discover};
pub use extract::{ExtractorRegistry, PdfExtractor, PlainTextExtractor};
pub use orchestrator::{Orchestrator, RunError, RunReport};
pub use summarize::LlmSummarizer;
