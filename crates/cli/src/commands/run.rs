//! `lts run`

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::debug;

use lts_runner::config::{Platform, RunConfiguration, DEFAULT_TIMEOUT_MS};
use lts_runner::org::{SfdxCli, SfdxOrg};
use lts_runner::server::SeleniumServer;
use lts_runner::webdriver::WebDriverLauncher;
use lts_runner::{exit_code_for, Collaborators, TestOrchestrator};

use super::CommandOutput;
use crate::output::ConsoleSink;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Test result format: human, tap, json or junit
    #[arg(short = 'r', long = "resultformat")]
    pub result_format: Option<String>,

    /// Name of the Lightning app containing the tests
    #[arg(short = 'a', long = "appname")]
    pub app_name: Option<String>,

    /// Directory to write the JUnit and JSON result files to
    #[arg(short = 'd', long = "outputdir")]
    pub output_dir: Option<PathBuf>,

    /// Automation server options (JSON, or TOML with a .toml extension)
    #[arg(short = 'f', long = "configfile")]
    pub config_file: Option<PathBuf>,

    /// Keep the browser open after the run
    #[arg(short = 'o', long = "leavebrowseropen")]
    pub leave_browser_open: bool,

    /// Milliseconds to wait for the test results to appear
    #[arg(short = 't', long = "timeout", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,

    /// Username or alias of the scratch org to test against
    #[arg(short = 'u', long = "targetusername", env = "SFDX_DEFAULTUSERNAME")]
    pub target_username: Option<String>,
}

pub async fn execute(args: RunArgs, json: bool) -> Result<CommandOutput> {
    let org = SfdxOrg::connect(SfdxCli::default(), args.target_username.as_deref()).await?;
    org.ensure_scratch_org()?;
    debug!("Running against {}", org.username());

    let config = RunConfiguration {
        result_format: args.result_format,
        config_file: args.config_file,
        output_dir: args.output_dir,
        target_username: Some(org.username().to_string()),
        json,
        timeout_ms: args.timeout,
        app_name: args.app_name,
        leave_browser_open: args.leave_browser_open,
    };

    let collaborators = Collaborators {
        server: Box::new(SeleniumServer::new(Platform::current())),
        browser: Box::new(WebDriverLauncher::new()),
        org: Box::new(org),
    };
    let mut orchestrator =
        TestOrchestrator::new(config, collaborators, Box::new(ConsoleSink::new(json)));

    orchestrator.initialize().await?;
    let document = orchestrator.run_tests().await?;

    Ok(CommandOutput {
        exit_code: exit_code_for(document.summary.failing),
        result: serde_json::to_value(&document)?,
    })
}
