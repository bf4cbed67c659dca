//! TAP (Test Anything Protocol) reporter

use tracing::info;

use super::{Column, OutputSink, ReportFormat, Reporter};
use crate::results::{ResultModel, TestCaseResult, TestOutcome};

pub struct TapReporter {
    sink: Box<dyn OutputSink>,
}

impl TapReporter {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self { sink }
    }

    fn result_line(number: usize, test: &TestCaseResult) -> String {
        match test.outcome {
            TestOutcome::Pass => format!("ok {} {}", number, test.full_name),
            TestOutcome::Skip => format!("ok {} {} # SKIP", number, test.full_name),
            TestOutcome::Fail => format!("not ok {} {}", number, test.full_name),
        }
    }
}

impl Reporter for TapReporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Tap
    }

    // Status lines stay out of the TAP stream.
    fn log(&mut self, message: &str) {
        info!("{}", message);
    }

    fn on_start(&mut self, model: &ResultModel) {
        let count = model.tests().len();
        if count > 0 {
            self.sink.log(&format!("1..{}", count));
        }
    }

    fn on_finished(&mut self, model: &ResultModel) {
        for (i, test) in model.tests().iter().enumerate() {
            self.sink.log(&Self::result_line(i + 1, test));
            if test.outcome != TestOutcome::Fail {
                continue;
            }
            // Diagnostics go on comment lines so TAP consumers ignore them
            for text in [test.message.as_deref(), test.stack_trace.as_deref()]
                .into_iter()
                .flatten()
            {
                for line in text.lines() {
                    self.sink.log(&format!("# {}", line));
                }
            }
        }
    }

    fn log_table(&mut self, title: &str, rows: &[Vec<String>], columns: &[Column]) {
        self.sink.table(title, rows, columns);
    }
}
