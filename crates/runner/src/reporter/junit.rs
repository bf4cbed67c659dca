//! JUnit XML reporter

use tracing::info;

use super::{Column, OutputSink, ReportFormat, Reporter};
use crate::results::ResultModel;

pub struct JUnitReporter {
    sink: Box<dyn OutputSink>,
}

impl JUnitReporter {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self { sink }
    }
}

impl Reporter for JUnitReporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::JUnit
    }

    // Status lines stay out of the XML stream.
    fn log(&mut self, message: &str) {
        info!("{}", message);
    }

    fn on_start(&mut self, _model: &ResultModel) {}

    fn on_finished(&mut self, model: &ResultModel) {
        self.sink.log(model.generate_junit().trim_end());
    }

    fn log_table(&mut self, title: &str, rows: &[Vec<String>], columns: &[Column]) {
        self.sink.table(title, rows, columns);
    }
}
