//! In-process stand-ins for the server, browser and org used by a run

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use lts_runner::config::{RunConfiguration, ServerOptions};
use lts_runner::error::{RunError, RunResult};
use lts_runner::org::{OrgAccess, OrgConfig};
use lts_runner::reporter::MemorySink;
use lts_runner::server::{AutomationServer, ServerState};
use lts_runner::webdriver::{BrowserLauncher, BrowserSession, SessionOptions};
use lts_runner::{Collaborators, TestOrchestrator};

pub const TWO_TESTS: &str = r#"{"tests": [
    {"FullName": "Greeting says hello", "Outcome": "Pass", "RunTime": 4},
    {"FullName": "Greeting says goodbye", "NamespacePrefix": "c", "Outcome": "Fail",
     "Message": "Expected 'hi' to be 'bye'.", "StackTrace": "Error: Expected\n    at spec.js:10", "RunTime": 6}
]}"#;

/// Call counters shared between a test and the fakes it hands out.
#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub starts: Arc<AtomicUsize>,
    pub kills: Arc<AtomicUsize>,
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub navigated: Arc<Mutex<Vec<String>>>,
    pub session_ports: Arc<Mutex<Vec<u16>>>,
}

impl Calls {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// How the fake test app behaves once loaded
#[derive(Debug, Clone)]
pub struct Page {
    /// Time between navigation and the results container filling in
    pub ready_after: Duration,
    /// Container text once ready
    pub payload: String,
    /// Text of the duration indicator, absent when `None`
    pub duration: Option<String>,
    pub fail_start: bool,
    pub fail_open: bool,
    pub fail_navigate: bool,
    pub fail_frontdoor: bool,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            ready_after: Duration::from_millis(1200),
            payload: TWO_TESTS.to_string(),
            duration: Some("finished in 1.2s".to_string()),
            fail_start: false,
            fail_open: false,
            fail_navigate: false,
            fail_frontdoor: false,
        }
    }
}

pub struct FakeServer {
    calls: Calls,
    fail_start: bool,
    state: ServerState,
}

#[async_trait]
impl AutomationServer for FakeServer {
    async fn start(&mut self, _options: &ServerOptions) -> RunResult<()> {
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(RunError::ServerStartup("port 4444 in use".to_string()));
        }
        self.state = ServerState::Running;
        Ok(())
    }

    async fn kill(&mut self) {
        self.calls.kills.fetch_add(1, Ordering::SeqCst);
        self.state = ServerState::Terminated;
    }

    fn state(&self) -> ServerState {
        self.state
    }
}

pub struct FakeLauncher {
    calls: Calls,
    page: Page,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn open(&self, options: &SessionOptions) -> RunResult<Box<dyn BrowserSession>> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        self.calls.session_ports.lock().push(options.port);
        if self.page.fail_open {
            return Err(RunError::Session("chrome not reachable".to_string()));
        }
        Ok(Box::new(FakeSession {
            calls: self.calls.clone(),
            page: self.page.clone(),
            ready_at: Mutex::new(None),
        }))
    }
}

pub struct FakeSession {
    calls: Calls,
    page: Page,
    ready_at: Mutex<Option<Instant>>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> RunResult<()> {
        if self.page.fail_navigate {
            return Err(RunError::WebDriver {
                command: "navigate".to_string(),
                error: "unknown error".to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        self.calls.navigated.lock().push(url.to_string());
        *self.ready_at.lock() = Some(Instant::now() + self.page.ready_after);
        Ok(())
    }

    async fn text_content(&self, _selector: &str) -> RunResult<Option<String>> {
        let ready_at = *self.ready_at.lock();
        match ready_at {
            None => Ok(None),
            Some(at) if Instant::now() >= at => Ok(Some(self.page.payload.clone())),
            Some(_) => Ok(Some(String::new())),
        }
    }

    async fn text(&self, selector: &str) -> RunResult<String> {
        self.page.duration.clone().ok_or_else(|| RunError::WebDriver {
            command: "find element".to_string(),
            error: "no such element".to_string(),
            message: format!("Unable to locate {}", selector),
        })
    }

    async fn close(&self) -> RunResult<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeOrg {
    fail_frontdoor: bool,
}

pub fn org_config() -> OrgConfig {
    OrgConfig {
        org_id: "00D000000000001".to_string(),
        instance_url: "https://fake.my.salesforce.com".to_string(),
        username: "test@example.com".to_string(),
    }
}

#[async_trait]
impl OrgAccess for FakeOrg {
    fn config(&self) -> OrgConfig {
        org_config()
    }

    async fn frontdoor_url(&self, path: &str) -> RunResult<String> {
        if self.fail_frontdoor {
            return Err(RunError::FrontDoorUrl("No org configuration found".to_string()));
        }
        Ok(format!(
            "{}/secur/frontdoor.jsp?sid=token&retURL={}",
            org_config().instance_url,
            path
        ))
    }
}

/// A fully wired orchestrator plus handles to observe it.
pub struct Harness {
    pub orchestrator: TestOrchestrator,
    pub sink: MemorySink,
    pub calls: Calls,
}

/// Route run logs through the test writer; `RUST_LOG=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn harness(config: RunConfiguration, page: Page) -> Harness {
    init_tracing();
    let calls = Calls::default();
    let sink = MemorySink::new();
    let collaborators = Collaborators {
        server: Box::new(FakeServer {
            calls: calls.clone(),
            fail_start: page.fail_start,
            state: ServerState::Uninstalled,
        }),
        browser: Box::new(FakeLauncher {
            calls: calls.clone(),
            page: page.clone(),
        }),
        org: Box::new(FakeOrg {
            fail_frontdoor: page.fail_frontdoor,
        }),
    };
    Harness {
        orchestrator: TestOrchestrator::new(config, collaborators, Box::new(sink.clone())),
        sink,
        calls,
    }
}

pub fn config(format: &str) -> RunConfiguration {
    RunConfiguration {
        result_format: Some(format.to_string()),
        ..RunConfiguration::default()
    }
}
