//! Drives one test run from configuration to report
//!
//! ```text
//! Created -> Initialized -> ServerStarting -> SessionOpen -> Polling
//!         -> Extracted -> Reported -> Done
//! ```
//!
//! Any step may move the run to `Errored`. Once the server has been started,
//! it is killed exactly once on every path out of [`TestOrchestrator::run_tests`].

use chrono::Utc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifacts::{prepare_output_dir, write_artifacts};
use crate::config::{RunConfiguration, ServerOptions};
use crate::error::{RunError, RunResult};
use crate::org::OrgAccess;
use crate::reporter::{OutputSink, ReportFormat, Reporter};
use crate::results::{RawResults, ResultDocument, ResultModel, RunTiming};
use crate::server::AutomationServer;
use crate::webdriver::{BrowserLauncher, BrowserSession, SessionOptions};

/// Element the test app fills with its JSON results when the run completes.
pub const RESULTS_SELECTOR: &str = "#run_results_full";

/// Optional on-page duration indicator, e.g. `finished in 1.234s`.
pub const DURATION_SELECTOR: &str = ".jasmine-duration";

/// Pause between checks of the results container.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Initialized,
    /// Server start requested; held until a browser session opens.
    ServerStarting,
    SessionOpen,
    Polling,
    Extracted,
    Reported,
    Done,
    Errored,
}

/// External systems a run talks to
pub struct Collaborators {
    pub server: Box<dyn AutomationServer>,
    pub browser: Box<dyn BrowserLauncher>,
    pub org: Box<dyn OrgAccess>,
}

pub struct TestOrchestrator {
    config: RunConfiguration,
    server_options: ServerOptions,
    session_options: SessionOptions,
    server: Box<dyn AutomationServer>,
    browser: Box<dyn BrowserLauncher>,
    org: Box<dyn OrgAccess>,
    sink: Option<Box<dyn OutputSink>>,
    reporter: Option<Box<dyn Reporter>>,
    state: RunState,
}

impl TestOrchestrator {
    pub fn new(
        config: RunConfiguration,
        collaborators: Collaborators,
        sink: Box<dyn OutputSink>,
    ) -> Self {
        Self {
            config,
            server_options: ServerOptions::default(),
            session_options: SessionOptions::default(),
            server: collaborators.server,
            browser: collaborators.browser,
            org: collaborators.org,
            sink: Some(sink),
            reporter: None,
            state: RunState::Created,
        }
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn server_options(&self) -> &ServerOptions {
        &self.server_options
    }

    pub fn session_options(&self) -> &SessionOptions {
        &self.session_options
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Format of the selected reporter, once initialized.
    pub fn reporter_format(&self) -> Option<ReportFormat> {
        self.reporter.as_ref().map(|r| r.format())
    }

    /// Whether the process should print machine-readable output.
    pub fn json_output(&self) -> bool {
        self.config.json
    }

    /// Resolve configuration, select the reporter, start the automation
    /// server and prepare the output directory.
    pub async fn initialize(&mut self) -> RunResult<()> {
        if self.state != RunState::Created {
            return Err(RunError::InvalidConfig(format!(
                "run already initialized (state {:?})",
                self.state
            )));
        }

        if let Err(e) = self.resolve_configuration() {
            return Err(self.fail(e));
        }
        self.state = RunState::Initialized;

        self.state = RunState::ServerStarting;
        info!("Starting automation server");
        if let Err(e) = self.server.start(&self.server_options).await {
            self.server.kill().await;
            return Err(self.fail(e));
        }

        if let Some(dir) = self.config.output_dir.clone() {
            if let Err(e) = prepare_output_dir(&dir).await {
                self.server.kill().await;
                return Err(self.fail(e));
            }
        }

        Ok(())
    }

    fn resolve_configuration(&mut self) -> RunResult<()> {
        if let Some(path) = &self.config.config_file {
            debug!("Loading server options from {}", path.display());
            self.server_options = ServerOptions::load(path)?;
        }
        // Sessions go to whichever port the server was told to listen on
        self.session_options.port = self.server_options.port;

        let format: ReportFormat = self
            .config
            .result_format
            .as_deref()
            .unwrap_or(ReportFormat::default().name())
            .parse()?;
        if format.forces_json_output() {
            self.config.json = true;
        }

        let sink = self
            .sink
            .take()
            .ok_or_else(|| RunError::InvalidConfig("output sink already consumed".to_string()))?;
        self.reporter = Some(format.reporter(sink));
        debug!("Selected {} reporter", format);
        Ok(())
    }

    /// Load the test app, wait for its results and report them.
    pub async fn run_tests(&mut self) -> RunResult<ResultDocument> {
        if self.state != RunState::ServerStarting {
            return Err(RunError::InvalidConfig(format!(
                "run_tests requires an initialized run (state {:?})",
                self.state
            )));
        }

        let message = match &self.config.target_username {
            Some(user) => format!("Invoking Lightning tests using {}...", user),
            None => "Invoking Lightning tests...".to_string(),
        };
        self.log(&message);

        let start_time = Utc::now();
        let extracted = self.extract(start_time).await;
        self.server.kill().await;

        let (raw, timing) = match extracted {
            Ok(v) => v,
            Err(e) => return Err(self.fail(e)),
        };
        let Some(raw) = raw else {
            return Err(self.fail(RunError::ResultRetrievalFailed(
                "the results container held no results".to_string(),
            )));
        };
        self.state = RunState::Extracted;

        self.log("Preparing test results...");
        let model = ResultModel::new(
            Uuid::new_v4().to_string(),
            raw.tests,
            timing,
            self.org.config(),
        );

        let Some(mut reporter) = self.reporter.take() else {
            return Err(self.fail(RunError::InvalidConfig("no reporter selected".to_string())));
        };
        let reported = match self.config.output_dir.clone() {
            Some(dir) => write_artifacts(&dir, &model, reporter.as_mut())
                .await
                .map(|_| ()),
            None => {
                reporter.on_start(&model);
                reporter.on_finished(&model);
                reporter.log("Test run complete");
                Ok(())
            }
        };
        let document = reporter
            .result()
            .cloned()
            .unwrap_or_else(|| model.to_json());
        self.reporter = Some(reporter);

        if let Err(e) = reported {
            return Err(self.fail(e));
        }
        self.state = RunState::Reported;

        info!(
            "Test run {} finished: {} passing, {} failing, {} skipped",
            model.run_id(),
            document.summary.passing,
            document.summary.failing,
            document.summary.skipped
        );
        self.state = RunState::Done;
        Ok(document)
    }

    async fn extract(
        &mut self,
        start_time: chrono::DateTime<Utc>,
    ) -> RunResult<(Option<RawResults>, RunTiming)> {
        let session = self
            .browser
            .open(&self.session_options)
            .await
            .map_err(RunError::test_run)?;
        self.state = RunState::SessionOpen;

        let extracted = self.drive(session.as_ref(), start_time).await;

        if self.config.leave_browser_open {
            debug!("Leaving browser session open");
        } else if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
        extracted
    }

    async fn drive(
        &mut self,
        session: &dyn BrowserSession,
        start_time: chrono::DateTime<Utc>,
    ) -> RunResult<(Option<RawResults>, RunTiming)> {
        let url = self
            .org
            .frontdoor_url(&self.config.app_path())
            .await
            .map_err(RunError::test_run)?;
        debug!("Navigating to {}", self.config.app_path());
        session.navigate(&url).await.map_err(RunError::test_run)?;

        self.state = RunState::Polling;
        let text = wait_for_results(session, RESULTS_SELECTOR, self.config.timeout())
            .await
            .map_err(RunError::test_run)?;
        let raw = RawResults::parse(&text).map_err(RunError::test_run)?;

        let duration = match session.text(DURATION_SELECTOR).await {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("No duration indicator: {}", e);
                None
            }
        };
        let timing = RunTiming::new(start_time).with_duration_text(duration.as_deref());
        Ok((raw, timing))
    }

    fn log(&mut self, message: &str) {
        if let Some(reporter) = self.reporter.as_mut() {
            reporter.log(message);
        }
    }

    fn fail(&mut self, err: RunError) -> RunError {
        warn!("Test run failed in state {:?}: {}", self.state, err);
        self.state = RunState::Errored;
        err
    }
}

/// Poll `selector` until it holds any text or `timeout` elapses.
/// The element is checked at least once.
pub async fn wait_for_results(
    session: &dyn BrowserSession,
    selector: &str,
    timeout: Duration,
) -> RunResult<String> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(text) = session.text_content(selector).await? {
            if !text.is_empty() {
                return Ok(text);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(RunError::ResultsNotFound {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}
