//! Pluggable result reporters
//!
//! A reporter is built once per run around an [`OutputSink`] and receives two
//! lifecycle calls after results are extracted: [`Reporter::on_start`] then
//! [`Reporter::on_finished`]. Reporters only read the model.

use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::RunError;
use crate::results::{ResultDocument, ResultModel};

mod human;
mod json;
mod junit;
mod tap;

pub use human::HumanReporter;
pub use json::JsonReporter;
pub use junit::JUnitReporter;
pub use tap::TapReporter;

/// Table column: `key` identifies the field, `label` is the header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
}

impl Column {
    pub const fn new(key: &'static str, label: &'static str) -> Self {
        Self { key, label }
    }
}

/// Interactive output the reporters write to
pub trait OutputSink: Send {
    fn log(&mut self, line: &str);

    /// Rows hold one cell per column, in column order.
    fn table(&mut self, title: &str, rows: &[Vec<String>], columns: &[Column]);
}

/// Sink that records everything in memory, shareable through clones.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn output(&self) -> String {
        self.lines.lock().join("\n")
    }
}

impl OutputSink for MemorySink {
    fn log(&mut self, line: &str) {
        self.lines.lock().extend(line.lines().map(String::from));
    }

    fn table(&mut self, title: &str, rows: &[Vec<String>], columns: &[Column]) {
        let mut lines = self.lines.lock();
        lines.push(format!("=== {}", title));
        lines.push(
            columns
                .iter()
                .map(|c| c.label)
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in rows {
            lines.push(row.join("  "));
        }
    }
}

/// Consumer of run lifecycle events
pub trait Reporter: Send {
    fn format(&self) -> ReportFormat;

    /// Free-form status line.
    fn log(&mut self, message: &str);

    fn on_start(&mut self, model: &ResultModel);

    fn on_finished(&mut self, model: &ResultModel);

    fn log_table(&mut self, title: &str, rows: &[Vec<String>], columns: &[Column]);

    /// Structured result held by reporters that accumulate one.
    fn result(&self) -> Option<&ResultDocument> {
        None
    }
}

/// Closed set of output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Human,
    Tap,
    Json,
    JUnit,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 4] = [
        ReportFormat::Human,
        ReportFormat::Tap,
        ReportFormat::Json,
        ReportFormat::JUnit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ReportFormat::Human => "human",
            ReportFormat::Tap => "tap",
            ReportFormat::Json => "json",
            ReportFormat::JUnit => "junit",
        }
    }

    /// Whether this format implies machine-readable process output.
    pub fn forces_json_output(self) -> bool {
        self == ReportFormat::Json
    }

    pub fn reporter(self, sink: Box<dyn OutputSink>) -> Box<dyn Reporter> {
        match self {
            ReportFormat::Human => Box::new(HumanReporter::new(sink)),
            ReportFormat::Tap => Box::new(TapReporter::new(sink)),
            ReportFormat::Json => Box::new(JsonReporter::new(sink)),
            ReportFormat::JUnit => Box::new(JUnitReporter::new(sink)),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = RunError;

    /// Exact, case-sensitive lookup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportFormat::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| RunError::InvalidReporter {
                value: s.to_string(),
                valid: ReportFormat::ALL
                    .iter()
                    .map(|f| f.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
