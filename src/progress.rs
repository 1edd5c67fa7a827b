//! Ingest progress reporting.
//!
//! Reports observable progress during `carag ingest` so users see how many
//! pages the search matched, which page is being processed and when the
//! index write starts. Progress is emitted on **stderr** so stdout remains
//! parseable for scripts.

use std::io::{IsTerminal, Write};
use std::sync::Arc;

use confluence_rag_core::ingest::{IngestEvent, IngestProgress, NoProgress};

/// Human-friendly progress on stderr: "ingest  page 3 / 50  ADR-7 (4 chunks)".
pub struct StderrProgress;

impl IngestProgress for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Found { total } => {
                format!("ingest  found {} pages\n", format_number(*total as u64))
            }
            IngestEvent::Page {
                n,
                total,
                title,
                chunks,
            } => format!(
                "ingest  page {} / {}  {} ({} chunks)\n",
                format_number(*n as u64),
                format_number(*total as u64),
                if title.is_empty() { "<untitled>" } else { title.as_str() },
                chunks
            ),
            IngestEvent::Writing { records } => {
                format!("ingest  writing {} records\n", format_number(*records as u64))
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgress for JsonProgress {
    fn report(&self, event: IngestEvent) {
        let obj = match &event {
            IngestEvent::Found { total } => serde_json::json!({
                "event": "progress",
                "phase": "found",
                "total": total
            }),
            IngestEvent::Page {
                n,
                total,
                title,
                chunks,
            } => serde_json::json!({
                "event": "progress",
                "phase": "page",
                "n": n,
                "total": total,
                "title": title,
                "chunks": chunks
            }),
            IngestEvent::Writing { records } => serde_json::json!({
                "event": "progress",
                "phase": "writing",
                "records": records
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if std::io::stderr().is_terminal() {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Arc<dyn IngestProgress> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
