//! Human readable console reporter

use super::{Column, OutputSink, ReportFormat, Reporter};
use crate::results::{ResultModel, TestOutcome};

const TEST_COLUMNS: [Column; 4] = [
    Column::new("name", "Test Name"),
    Column::new("outcome", "Outcome"),
    Column::new("message", "Message"),
    Column::new("runtime", "Runtime (ms)"),
];

const SUMMARY_COLUMNS: [Column; 2] = [Column::new("name", "Name"), Column::new("value", "Value")];

pub struct HumanReporter {
    sink: Box<dyn OutputSink>,
}

impl HumanReporter {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        Self { sink }
    }

    fn log_failures(&mut self, model: &ResultModel) {
        let failures: Vec<_> = model
            .tests()
            .iter()
            .filter(|t| t.outcome == TestOutcome::Fail)
            .collect();
        if failures.is_empty() {
            return;
        }

        self.sink.log(&format!("=== Failures ({})", failures.len()));
        for test in failures {
            self.sink.log(&test.full_name);
            if let Some(message) = &test.message {
                self.sink.log(&format!("  {}", message));
            }
            if let Some(stack) = &test.stack_trace {
                for line in stack.lines() {
                    self.sink.log(&format!("    {}", line.trim_start()));
                }
            }
        }
    }
}

impl Reporter for HumanReporter {
    fn format(&self) -> ReportFormat {
        ReportFormat::Human
    }

    fn log(&mut self, message: &str) {
        self.sink.log(message);
    }

    fn on_start(&mut self, model: &ResultModel) {
        self.sink.log(&format!(
            "Extracted {} test result(s) from {}",
            model.tests().len(),
            model.test_origin()
        ));
    }

    fn on_finished(&mut self, model: &ResultModel) {
        if !model.tests().is_empty() {
            let rows: Vec<Vec<String>> = model
                .tests()
                .iter()
                .map(|t| {
                    vec![
                        t.full_name.clone(),
                        format!("{:?}", t.outcome),
                        t.message.clone().unwrap_or_default(),
                        t.run_time.map(|ms| format!("{}", ms)).unwrap_or_default(),
                    ]
                })
                .collect();
            self.sink.table("Test Results", &rows, &TEST_COLUMNS);
        }

        self.log_failures(model);

        let doc = model.to_json();
        let s = doc.summary;
        let rows: Vec<Vec<String>> = [
            ("Outcome", s.outcome),
            ("Tests Ran", s.tests_ran.to_string()),
            ("Passing", s.passing.to_string()),
            ("Failing", s.failing.to_string()),
            ("Skipped", s.skipped.to_string()),
            ("Pass Rate", s.pass_rate),
            ("Fail Rate", s.fail_rate),
            ("Test Start Time", s.test_start_time),
            ("Test Execution Time", s.test_execution_time),
            ("Org Id", s.org_id),
            ("Username", s.username),
            ("Test Run Id", s.test_run_id),
        ]
        .into_iter()
        .map(|(name, value)| vec![name.to_string(), value])
        .collect();
        self.sink.table("Test Summary", &rows, &SUMMARY_COLUMNS);
    }

    fn log_table(&mut self, title: &str, rows: &[Vec<String>], columns: &[Column]) {
        self.sink.table(title, rows, columns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::sample_model;
    use crate::reporter::MemorySink;

    #[test]
    fn test_human_output_has_results_failures_and_summary() {
        let sink = MemorySink::new();
        let mut reporter = HumanReporter::new(Box::new(sink.clone()));
        let model = sample_model();

        reporter.on_start(&model);
        reporter.on_finished(&model);

        let out = sink.output();
        assert!(out.contains("Extracted 2 test result(s) from force.lightning"));
        assert!(out.contains("=== Test Results"));
        assert!(out.contains("=== Failures (1)"));
        assert!(out.contains("  Expected 'hi' to be 'bye'."));
        assert!(out.contains("=== Test Summary"));
        assert!(out.contains("Failing  1"));
        assert!(out.contains("Outcome  Failed"));
    }
}
