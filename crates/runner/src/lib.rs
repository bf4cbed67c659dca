//! Lightning test runner
//!
//! This crate runs an in-app Lightning test suite inside a real browser and
//! reports the results:
//! - Installs and spawns a local Selenium server
//! - Opens a WebDriver session and loads the test app through an org front door
//! - Polls the page for the JSON results payload under a timeout
//! - Builds a canonical result model and renders it as human, TAP, JSON or JUnit
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TestOrchestrator                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  initialize()                                               │
//! │    ├── ServerOptions::load(config_file)                     │
//! │    ├── ReportFormat::from_str -> Box<dyn Reporter>          │
//! │    ├── AutomationServer::start()                            │
//! │    └── prepare_output_dir()                                 │
//! │  run_tests() -> ResultDocument                              │
//! │    ├── BrowserLauncher::open() -> BrowserSession            │
//! │    ├── OrgAccess::frontdoor_url(/c/<app>.app)               │
//! │    ├── wait_for_results(#run_results_full, timeout)         │
//! │    ├── AutomationServer::kill()     (every exit path)       │
//! │    └── Reporter::on_start/on_finished | write_artifacts()   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod org;
pub mod release;
pub mod reporter;
pub mod results;
pub mod server;
pub mod webdriver;

pub use config::{Platform, RunConfiguration, ServerOptions};
pub use error::{ErrorCategory, RunError, RunResult};
pub use orchestrator::{Collaborators, RunState, TestOrchestrator};
pub use reporter::{Column, MemorySink, OutputSink, ReportFormat, Reporter};
pub use results::{exit_code_for, ResultDocument, ResultModel, TESTS_FAILED_EXIT_CODE};
