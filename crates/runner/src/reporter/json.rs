//! JSON reporter
//!
//! Prints nothing while the run is in progress; the plain-data form of the
//! model is kept and handed back as the command result.

use tracing::debug;

use super::{Column, OutputSink, ReportFormat, Reporter};
use crate::results::{ResultDocument, ResultModel};

pub struct JsonReporter {
    // Held so all reporters share one constructor; JSON mode never writes to it.
    _sink: Box<dyn OutputSink>,
    document: Option<ResultDocument>,
}

impl JsonReporter {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self {
            _sink: sink,
            document: None,
        }
    }
}

impl Reporter for JsonReporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Json
    }

    fn log(&mut self, message: &str) {
        debug!("{}", message);
    }

    fn on_start(&mut self, model: &ResultModel) {
        debug!("Collecting {} test result(s)", model.tests().len());
    }

    fn on_finished(&mut self, model: &ResultModel) {
        self.document = Some(model.to_json());
    }

    fn log_table(&mut self, title: &str, rows: &[Vec<String>], _columns: &[Column]) {
        debug!("{}: {:?}", title, rows);
    }

    fn result(&self) -> Option<&ResultDocument> {
        self.document.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::sample_model;
    use crate::reporter::MemorySink;

    #[test]
    fn test_json_reporter_is_silent_and_keeps_document() {
        let sink = MemorySink::new();
        let mut reporter = JsonReporter::new(Box::new(sink.clone()));
        let model = sample_model();

        reporter.log("Invoking Lightning tests...");
        assert!(reporter.result().is_none());
        reporter.on_start(&model);
        reporter.on_finished(&model);

        assert!(sink.lines().is_empty());
        assert_eq!(reporter.result(), Some(&model.to_json()));
    }
}
