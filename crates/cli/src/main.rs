//! LTS CLI - Main Entry Point
//!
//! Runs in-app Lightning test suites in a browser and installs the test
//! framework package into an org.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lts_runner::ReportFormat;

mod commands;
mod output;

use commands::{install, run, CommandOutput};

/// Lightning Testing Service runner
#[derive(Parser)]
#[command(name = "lts")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Format output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Lightning tests in a browser against a scratch org
    Run(run::RunArgs),

    /// Install the Lightning Testing Service package into an org
    Install(install::InstallArgs),
}

/// Whether the selected reporter implies machine-readable process output.
/// Unknown formats are left for the run itself to reject.
fn forces_json_output(result_format: Option<&str>) -> bool {
    result_format
        .and_then(|f| f.parse::<ReportFormat>().ok())
        .is_some_and(ReportFormat::forces_json_output)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json
        || matches!(&cli.command, Commands::Run(args) if forces_json_output(args.result_format.as_deref()));

    let outcome = match cli.command {
        Commands::Run(args) => run::execute(args, json).await,
        Commands::Install(args) => install::execute(args, json).await,
    };

    match outcome {
        Ok(CommandOutput { result, exit_code }) => {
            if json {
                output::print_json_result(&result);
            }
            if let Some(code) = exit_code {
                std::process::exit(code);
            }
            Ok(())
        }
        Err(e) if json => {
            output::print_json_error(&e);
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}
