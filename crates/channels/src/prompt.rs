//! Terminal prompt — asks a human for a keep/remove/skip decision.
//!
//! Reads answers line by line from stdin, writes the summary card to
//! stdout. Generic over the reader and writer so tests can script input.

use async_trait::async_trait;
use papertriage_core::decision::Action;
use papertriage_core::document::{DocumentRecord, fields};
use papertriage_core::error::PromptError;
use papertriage_core::prompt::{DecisionPrompt, PromptReply};
use papertriage_core::summary::Summary;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Fields shown above the summary, in display order.
const SHOWN_FIELDS: [(&str, &str); 3] = [
    (fields::AUTHORS, "Authors"),
    (fields::YEAR, "Year"),
    (fields::SOURCE, "Source"),
];

/// Interactive decision prompt over a line-oriented reader and writer.
pub struct LinePrompt<R, W> {
    io: Mutex<(R, W)>,
}

/// The prompt wired to the process terminal.
pub type TerminalPrompt = LinePrompt<BufReader<io::Stdin>, io::Stdout>;

impl TerminalPrompt {
    pub fn stdio() -> Self {
        LinePrompt::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> LinePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    /// Give back the reader and writer (used by tests to inspect output).
    pub fn into_inner(self) -> (R, W) {
        self.io.into_inner()
    }
}

/// What a single line of input means.
#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Decide(Action),
    Open,
    Quit,
    Invalid,
}

fn parse_answer(line: &str) -> Answer {
    match line.trim().to_lowercase().as_str() {
        "o" | "open" => Answer::Open,
        "q" | "quit" | "exit" => Answer::Quit,
        "" => Answer::Invalid,
        other => other
            .parse::<Action>()
            .map(Answer::Decide)
            .unwrap_or(Answer::Invalid),
    }
}

/// Render the card shown before asking.
pub fn render_card(document: &DocumentRecord, summary: &Summary, dry_run: bool) -> String {
    let mut out = String::new();
    let rule = "─".repeat(60);

    out.push_str(&format!("\n{rule}\n"));
    out.push_str(&format!("📄 {}\n", document.title()));
    out.push_str(&format!("   {}\n", document.path.display()));
    for (key, label) in SHOWN_FIELDS {
        if let Some(value) = document.get(key) {
            out.push_str(&format!("   {label}: {value}\n"));
        }
    }
    out.push('\n');

    match summary.fields() {
        Some(summary_fields) => {
            for (label, value) in summary_fields.labelled() {
                let value = value.trim();
                if !value.is_empty() {
                    out.push_str(&format!("  {label}: {value}\n"));
                }
            }
        }
        None => {
            out.push_str("  (unstructured summary)\n");
            for line in summary.raw().lines().filter(|l| !l.trim().is_empty()) {
                out.push_str(&format!("  {}\n", line.trim()));
            }
        }
    }

    if dry_run {
        out.push_str("\n  [dry run: no files will be moved]\n");
    }
    out.push_str(&format!("{rule}\n"));
    out
}

const CHOICES: &str = "[k]eep  [r]emove  [s]kip  [o]pen  [q]uit > ";

#[async_trait]
impl<R, W> DecisionPrompt for LinePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(
        &self,
        document: &DocumentRecord,
        summary: &Summary,
        dry_run: bool,
    ) -> Result<PromptReply, PromptError> {
        let mut guard = self.io.lock().await;
        let (reader, writer) = &mut *guard;

        let card = render_card(document, summary, dry_run);
        write_out(writer, &card).await?;

        loop {
            write_out(writer, CHOICES).await?;

            let mut line = String::new();
            let read = reader
                .read_line(&mut line)
                .await
                .map_err(|e| PromptError::Io(e.to_string()))?;
            if read == 0 {
                // EOF (Ctrl+D)
                debug!("Prompt input closed");
                return Ok(PromptReply::Quit);
            }

            match parse_answer(&line) {
                Answer::Decide(action) => return Ok(PromptReply::Decide(action)),
                Answer::Quit => return Ok(PromptReply::Quit),
                Answer::Open => {
                    if let Err(e) = open::that(&document.path) {
                        warn!(path = %document.path.display(), error = %e, "Could not open file");
                        write_out(writer, &format!("  Could not open file: {e}\n")).await?;
                    }
                }
                Answer::Invalid => {
                    write_out(writer, "  Please answer k, r, s, o or q.\n").await?;
                }
            }
        }
    }
}

async fn write_out<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> Result<(), PromptError> {
    writer
        .write_all(text.as_bytes())
        .await
        .map_err(|e| PromptError::Io(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| PromptError::Io(e.to_string()))
}
