//! Canonical result model for one test run and its serialized forms

use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RunError, RunResult};
use crate::org::OrgConfig;

/// Origin label for tests executed inside a Lightning app.
pub const TEST_ORIGIN: &str = "force.lightning";

/// Exit code signalled when a run reports failing tests.
pub const TESTS_FAILED_EXIT_CODE: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestOutcome {
    #[serde(alias = "Passed", alias = "pass", alias = "passed")]
    Pass,
    #[serde(alias = "Failed", alias = "fail", alias = "failed")]
    Fail,
    #[serde(
        alias = "Skipped",
        alias = "Pending",
        alias = "skip",
        alias = "skipped",
        alias = "pending"
    )]
    Skip,
}

/// One executed test as reported by the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestCaseResult {
    pub full_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_prefix: Option<String>,

    pub outcome: TestOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    /// Milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_time: Option<f64>,
}

/// What the results container on the page holds once the run completes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResults {
    #[serde(default)]
    pub tests: Vec<TestCaseResult>,
}

impl RawResults {
    /// Parse the container text. JSON `null` means the page produced nothing.
    pub fn parse(text: &str) -> RunResult<Option<Self>> {
        serde_json::from_str(text).map_err(RunError::MalformedResults)
    }
}

/// Timing and origin captured around the in-page run
#[derive(Debug, Clone, PartialEq)]
pub struct RunTiming {
    pub start_time: DateTime<Utc>,
    pub test_time_ms: f64,
    pub test_execution_time_ms: f64,
    pub user_id: String,
}

impl RunTiming {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            test_time_ms: 0.0,
            test_execution_time_ms: 0.0,
            user_id: String::new(),
        }
    }

    /// Apply the page's duration indicator, e.g. `finished in 1.234s`.
    /// Unparseable text leaves the timing at zero.
    pub fn with_duration_text(mut self, text: Option<&str>) -> Self {
        if let Some(seconds) = text.and_then(parse_duration_seconds) {
            self.test_time_ms = seconds * 1000.0;
            self.test_execution_time_ms = self.test_time_ms;
        }
        self
    }
}

static NUMERIC_TOKEN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[0-9.]+").ok());

/// First numeric token in `text`, read as seconds.
pub fn parse_duration_seconds(text: &str) -> Option<f64> {
    let regex = NUMERIC_TOKEN.as_ref()?;
    regex
        .find_iter(text)
        .find_map(|m| m.as_str().parse::<f64>().ok())
}

/// Aggregate over all tests in a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub timing: RunTiming,
    pub tests_ran: usize,
    pub passing: usize,
    pub failing: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn from_tests(timing: RunTiming, tests: &[TestCaseResult]) -> Self {
        let count = |outcome| tests.iter().filter(|t| t.outcome == outcome).count();
        Self {
            timing,
            tests_ran: tests.len(),
            passing: count(TestOutcome::Pass),
            failing: count(TestOutcome::Fail),
            skipped: count(TestOutcome::Skip),
        }
    }

    pub fn outcome(&self) -> &'static str {
        if self.failing > 0 {
            "Failed"
        } else {
            "Passed"
        }
    }

    fn rate(&self, n: usize) -> String {
        let executed = self.passing + self.failing;
        if executed == 0 {
            "0%".to_string()
        } else {
            format!("{}%", (n * 100 + executed / 2) / executed)
        }
    }
}

/// Process exit code for a finished run, `None` meaning success.
pub fn exit_code_for(failing: usize) -> Option<i32> {
    (failing > 0).then_some(TESTS_FAILED_EXIT_CODE)
}

/// Canonical, read-only representation of one run
#[derive(Debug, Clone, PartialEq)]
pub struct ResultModel {
    run_id: String,
    test_origin: String,
    tests: Vec<TestCaseResult>,
    summary: RunSummary,
    org: OrgConfig,
}

impl ResultModel {
    pub fn new(run_id: impl Into<String>, tests: Vec<TestCaseResult>, timing: RunTiming, org: OrgConfig) -> Self {
        let summary = RunSummary::from_tests(timing, &tests);
        Self {
            run_id: run_id.into(),
            test_origin: TEST_ORIGIN.to_string(),
            tests,
            summary,
            org,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn test_origin(&self) -> &str {
        &self.test_origin
    }

    pub fn tests(&self) -> &[TestCaseResult] {
        &self.tests
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn org(&self) -> &OrgConfig {
        &self.org
    }

    /// Grouping label used as the JUnit classname.
    pub fn namespace_of<'a>(&'a self, test: &'a TestCaseResult) -> &'a str {
        match test.namespace_prefix.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => &self.test_origin,
        }
    }

    pub fn to_json(&self) -> ResultDocument {
        let s = &self.summary;
        let start = s.timing.start_time.to_rfc3339_opts(SecondsFormat::Millis, true);
        ResultDocument {
            summary: SummaryDocument {
                outcome: s.outcome().to_string(),
                tests_ran: s.tests_ran,
                passing: s.passing,
                failing: s.failing,
                skipped: s.skipped,
                pass_rate: s.rate(s.passing),
                fail_rate: s.rate(s.failing),
                test_start_time: start,
                test_execution_time: format_ms(s.timing.test_execution_time_ms),
                test_total_time: format_ms(s.timing.test_time_ms),
                hostname: self.org.instance_url.clone(),
                org_id: self.org.org_id.clone(),
                username: self.org.username.clone(),
                test_run_id: self.run_id.clone(),
                user_id: s.timing.user_id.clone(),
                test_origin: self.test_origin.clone(),
            },
            tests: self.tests.clone(),
        }
    }

    /// Pretty JSON with 4-space indentation, as written to disk.
    pub fn to_json_string(&self) -> RunResult<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.to_json().serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn generate_junit(&self) -> String {
        let s = &self.summary;
        let mut xml = String::new();
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuite name="{}" timestamp="{}" hostname="{}" tests="{}" failures="{}" errors="0" skipped="{}" time="{}">"#,
            escape(&self.test_origin),
            s.timing.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            escape(&self.org.instance_url),
            s.tests_ran,
            s.failing,
            s.skipped,
            format_seconds(s.timing.test_execution_time_ms),
        ));
        xml.push('\n');

        xml.push_str("    <properties>\n");
        for (name, value) in [
            ("testRunId", self.run_id.as_str()),
            ("orgId", self.org.org_id.as_str()),
            ("username", self.org.username.as_str()),
            ("outcome", s.outcome()),
        ] {
            xml.push_str(&format!(
                "        <property name=\"{}\" value=\"{}\"/>\n",
                name,
                escape(value)
            ));
        }
        xml.push_str("    </properties>\n");

        for test in &self.tests {
            xml.push_str(&format!(
                r#"    <testcase name="{}" classname="{}" time="{}">"#,
                escape(&test.full_name),
                escape(self.namespace_of(test)),
                format_seconds(test.run_time.unwrap_or(0.0)),
            ));
            match test.outcome {
                TestOutcome::Pass => {}
                TestOutcome::Skip => xml.push_str("\n        <skipped/>\n    "),
                TestOutcome::Fail => {
                    let message = test.message.as_deref().unwrap_or_default();
                    xml.push_str(&format!("\n        <failure message=\"{}\">", escape(message)));
                    if let Some(stack) = test.stack_trace.as_deref() {
                        xml.push_str(&escape(stack));
                    }
                    xml.push_str("</failure>\n    ");
                }
            }
            xml.push_str("</testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

/// Plain-data form of a [`ResultModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub summary: SummaryDocument,
    pub tests: Vec<TestCaseResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDocument {
    pub outcome: String,
    pub tests_ran: usize,
    pub passing: usize,
    pub failing: usize,
    pub skipped: usize,
    pub pass_rate: String,
    pub fail_rate: String,
    pub test_start_time: String,
    pub test_execution_time: String,
    pub test_total_time: String,
    pub hostname: String,
    pub org_id: String,
    pub username: String,
    pub test_run_id: String,
    pub user_id: String,
    pub test_origin: String,
}

fn format_ms(ms: f64) -> String {
    format!("{} ms", ms.round() as u64)
}

fn format_seconds(ms: f64) -> String {
    format!("{:.3}", ms / 1000.0)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test(name: &str, outcome: TestOutcome) -> TestCaseResult {
        TestCaseResult {
            full_name: name.to_string(),
            namespace_prefix: None,
            outcome,
            message: None,
            stack_trace: None,
            run_time: Some(12.0),
        }
    }

    fn timing() -> RunTiming {
        RunTiming::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_parse_raw_results() {
        let raw = RawResults::parse(
            r#"{"tests": [{"FullName": "suite spec", "Outcome": "Pass", "RunTime": 4, "Extra": true}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(raw.tests.len(), 1);
        assert_eq!(raw.tests[0].outcome, TestOutcome::Pass);
        assert_eq!(raw.tests[0].run_time, Some(4.0));
    }

    #[test]
    fn test_parse_null_and_malformed() {
        assert!(RawResults::parse("null").unwrap().is_none());
        assert!(matches!(
            RawResults::parse("<div>"),
            Err(RunError::MalformedResults(_))
        ));
    }

    #[test]
    fn test_outcome_aliases() {
        let parsed: Vec<TestOutcome> =
            serde_json::from_str(r#"["Passed", "Failed", "Pending", "Skip"]"#).unwrap();
        assert_eq!(
            parsed,
            [TestOutcome::Pass, TestOutcome::Fail, TestOutcome::Skip, TestOutcome::Skip]
        );
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration_seconds("finished in 1.234s"), Some(1.234));
        assert_eq!(parse_duration_seconds("no digits"), None);
        assert_eq!(parse_duration_seconds("took . then 0.5 seconds"), Some(0.5));

        let t = timing().with_duration_text(Some("finished in 2.5s"));
        assert_eq!(t.test_time_ms, 2500.0);
        assert_eq!(t.test_execution_time_ms, 2500.0);

        let t = timing().with_duration_text(None);
        assert_eq!(t.test_time_ms, 0.0);
    }

    #[test]
    fn test_summary_counts_and_rates() {
        let model = ResultModel::new(
            "run-1",
            vec![
                test("a", TestOutcome::Pass),
                test("b", TestOutcome::Fail),
                test("c", TestOutcome::Pass),
                test("d", TestOutcome::Skip),
            ],
            timing(),
            OrgConfig::default(),
        );
        let doc = model.to_json();
        assert_eq!(doc.summary.tests_ran, 4);
        assert_eq!(doc.summary.passing, 2);
        assert_eq!(doc.summary.failing, 1);
        assert_eq!(doc.summary.skipped, 1);
        assert_eq!(doc.summary.pass_rate, "67%");
        assert_eq!(doc.summary.fail_rate, "33%");
        assert_eq!(doc.summary.outcome, "Failed");
        assert_eq!(doc.summary.test_start_time, "2024-03-01T12:00:00.000Z");
    }

    #[test]
    fn test_exit_code_policy() {
        assert_eq!(exit_code_for(0), None);
        assert_eq!(exit_code_for(3), Some(TESTS_FAILED_EXIT_CODE));
    }

    #[test]
    fn test_junit_failure_and_escaping() {
        let mut failing = test("renders <b> & \"quotes\"", TestOutcome::Fail);
        failing.message = Some("Expected 1 to be 2.".to_string());
        failing.stack_trace = Some("at <anonymous>".to_string());
        failing.namespace_prefix = Some("c".to_string());

        let model = ResultModel::new("run-1", vec![failing], timing(), OrgConfig::default());
        let xml = model.generate_junit();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"tests="1" failures="1""#));
        assert!(xml.contains(r#"name="renders &lt;b&gt; &amp; &quot;quotes&quot;" classname="c" time="0.012""#));
        assert!(xml.contains(r#"<failure message="Expected 1 to be 2.">at &lt;anonymous&gt;</failure>"#));
        assert!(xml.trim_end().ends_with("</testsuite>"));
    }

    #[test]
    fn test_json_string_uses_four_space_indent() {
        let model = ResultModel::new("run-1", vec![], timing(), OrgConfig::default());
        let json = model.to_json_string().unwrap();
        assert!(json.contains("\n    \"summary\": {\n        \"outcome\": \"Passed\""));
        assert!(json.contains("\"tests\": []"));
    }
}
