//! Console output for the CLI

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde_json::{json, Value};

use lts_runner::{Column, OutputSink, RunError};

/// Reporter sink writing to stdout. Quiet in JSON mode, where stdout carries
/// only the final envelope.
pub struct ConsoleSink {
    quiet: bool,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self { quiet: json }
    }
}

impl OutputSink for ConsoleSink {
    fn log(&mut self, line: &str) {
        if !self.quiet {
            println!("{}", line);
        }
    }

    fn table(&mut self, title: &str, rows: &[Vec<String>], columns: &[Column]) {
        if self.quiet {
            return;
        }

        println!("{}", title.bold());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(columns.iter().map(|c| c.label));
        for row in rows {
            table.add_row(row.clone());
        }

        println!("{table}");
    }
}

/// Success envelope: `{"status": 0, "result": ...}`
pub fn print_json_result(result: &Value) {
    let envelope = json!({ "status": 0, "result": result });
    println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
}

/// Error envelope: `{"status": 1, "name": ..., "message": ...}`
pub fn print_json_error(err: &anyhow::Error) {
    let name = err
        .downcast_ref::<RunError>()
        .map(RunError::name)
        .unwrap_or("Error");
    let envelope = json!({ "status": 1, "name": name, "message": err.to_string() });
    println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "→".cyan(), message);
}
