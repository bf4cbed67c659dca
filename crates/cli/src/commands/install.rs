//! `lts install`

use anyhow::Result;
use clap::Args;
use serde_json::json;

use lts_runner::org::{PackageInstaller, SfdxCli};
use lts_runner::release::{PackageType, ReleaseClient};

use super::CommandOutput;
use crate::output::{print_info, print_success};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Release version to install, e.g. v1.0.0
    #[arg(short = 'r', long = "releaseversion", default_value = "latest")]
    pub release_version: String,

    /// Package to install: jasmine, mocha or full
    #[arg(short = 't', long = "packagetype", default_value = "full")]
    pub package_type: String,

    /// Minutes to wait for the install to finish
    #[arg(short = 'w', long = "wait", default_value_t = PackageInstaller::DEFAULT_WAIT_MINUTES)]
    pub wait: u32,

    /// Username or alias of the org to install into
    #[arg(short = 'u', long = "targetusername", env = "SFDX_DEFAULTUSERNAME")]
    pub target_username: Option<String>,
}

pub async fn execute(args: InstallArgs, json: bool) -> Result<CommandOutput> {
    let package_type: PackageType = args.package_type.parse()?;

    let package_id = ReleaseClient::default()
        .package_id(Some(&args.release_version), package_type)
        .await?;
    if !json {
        print_info(&format!(
            "Installing {} package {} ({})",
            package_type, package_id, args.release_version
        ));
    }

    let installed = PackageInstaller::new(SfdxCli::default())
        .install(&package_id, args.wait, args.target_username.as_deref())
        .await?;
    if !json {
        print_success(&format!("Installed package {}", package_id));
    }

    Ok(CommandOutput {
        result: json!({
            "packageId": package_id,
            "packageType": package_type.to_string(),
            "install": installed,
        }),
        exit_code: None,
    })
}
