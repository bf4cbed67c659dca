//! Org access through the `sfdx` command line

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{RunError, RunResult};

/// Identity of the org a run executes against; carried into reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgConfig {
    pub org_id: String,
    pub instance_url: String,
    pub username: String,
}

/// Resolves authenticated URLs inside an org.
#[async_trait]
pub trait OrgAccess: Send + Sync {
    fn config(&self) -> OrgConfig;

    /// Fully qualified URL for `path` that logs the browser in on arrival.
    async fn frontdoor_url(&self, path: &str) -> RunResult<String>;
}

/// Thin wrapper that runs `sfdx` commands in JSON mode
#[derive(Debug, Clone)]
pub struct SfdxCli {
    binary: String,
}

impl Default for SfdxCli {
    fn default() -> Self {
        Self {
            binary: "sfdx".to_string(),
        }
    }
}

impl SfdxCli {
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run a command with `--json` and return its `result` field.
    pub async fn run_json(&self, args: &[String]) -> RunResult<Value> {
        debug!("Running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .arg("--json")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RunError::OrgCommand(format!("Failed to run {}: {}", self.binary, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_envelope(&stdout).map_err(|e| match e {
            RunError::OrgCommand(msg) if stdout.trim().is_empty() => RunError::OrgCommand(format!(
                "{}: {}",
                msg,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            other => other,
        })
    }
}

/// Decode the `{"status": .., "result": ..}` envelope printed by `--json`.
pub fn parse_envelope(stdout: &str) -> RunResult<Value> {
    let envelope: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| RunError::OrgCommand(format!("Unreadable command output: {}", e)))?;

    let status = envelope.get("status").and_then(Value::as_i64).unwrap_or(1);
    if status != 0 {
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("command failed");
        return Err(RunError::OrgCommand(format!("status {}: {}", status, message)));
    }

    Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct OrgDisplay {
    id: String,
    instance_url: String,
    username: String,
    dev_hub_id: Option<String>,
}

/// An org resolved through `sfdx force:org:display`
pub struct SfdxOrg {
    cli: SfdxCli,
    display: OrgDisplay,
}

impl SfdxOrg {
    pub async fn connect(cli: SfdxCli, target_username: Option<&str>) -> RunResult<Self> {
        let mut args = vec!["force:org:display".to_string()];
        if let Some(username) = target_username {
            args.extend(["--targetusername".to_string(), username.to_string()]);
        }

        let result = cli.run_json(&args).await?;
        let org_display: OrgDisplay = serde_json::from_value(result)?;
        debug!(
            "Resolved org {} ({})",
            org_display.username, org_display.id
        );

        Ok(Self {
            cli,
            display: org_display,
        })
    }

    pub fn username(&self) -> &str {
        &self.display.username
    }

    /// Scratch orgs are the only ones that report a dev hub.
    pub fn is_scratch_org(&self) -> bool {
        self.display.dev_hub_id.is_some()
    }

    pub fn ensure_scratch_org(&self) -> RunResult<()> {
        if self.is_scratch_org() {
            Ok(())
        } else {
            Err(RunError::NotScratchOrg(format!(
                "{} is not a scratch org",
                self.display.username
            )))
        }
    }
}

#[async_trait]
impl OrgAccess for SfdxOrg {
    fn config(&self) -> OrgConfig {
        OrgConfig {
            org_id: self.display.id.clone(),
            instance_url: self.display.instance_url.clone(),
            username: self.display.username.clone(),
        }
    }

    async fn frontdoor_url(&self, path: &str) -> RunResult<String> {
        let args = vec![
            "force:org:open".to_string(),
            "--urlonly".to_string(),
            "--targetusername".to_string(),
            self.display.username.clone(),
            "--path".to_string(),
            path.to_string(),
        ];

        let result = self
            .cli
            .run_json(&args)
            .await
            .map_err(|e| RunError::FrontDoorUrl(e.to_string()))?;

        result
            .get("url")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RunError::FrontDoorUrl("response did not contain a url".to_string()))
    }
}

/// Installs a package version into an org
pub struct PackageInstaller {
    cli: SfdxCli,
}

impl PackageInstaller {
    pub const DEFAULT_WAIT_MINUTES: u32 = 2;

    pub fn new(cli: SfdxCli) -> Self {
        Self { cli }
    }

    pub async fn install(
        &self,
        package_id: &str,
        wait_minutes: u32,
        target_username: Option<&str>,
    ) -> RunResult<Value> {
        let mut args = install_args(package_id, wait_minutes);
        if let Some(username) = target_username {
            args.extend(["--targetusername".to_string(), username.to_string()]);
        }

        self.cli.run_json(&args).await.map_err(|e| match e {
            RunError::OrgCommand(msg) => RunError::PackageInstall(msg),
            other => other,
        })
    }
}

fn install_args(package_id: &str, wait_minutes: u32) -> Vec<String> {
    vec![
        "force:package:install".to_string(),
        "--wait".to_string(),
        wait_minutes.to_string(),
        "--package".to_string(),
        package_id.to_string(),
        "--securitytype".to_string(),
        "AllUsers".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let out = r#"{"status": 0, "result": {"url": "https://x.my.salesforce.com/secur/frontdoor.jsp?sid=1"}}"#;
        let result = parse_envelope(out).unwrap();
        assert_eq!(
            result["url"],
            "https://x.my.salesforce.com/secur/frontdoor.jsp?sid=1"
        );
    }

    #[test]
    fn test_envelope_non_zero_status() {
        let out = r#"{"status": 1, "name": "NoOrgFound", "message": "No org configuration found"}"#;
        let err = parse_envelope(out).unwrap_err();
        assert!(err.to_string().contains("No org configuration found"));
    }

    #[test]
    fn test_envelope_garbage() {
        assert!(matches!(
            parse_envelope("sfdx: command not found"),
            Err(RunError::OrgCommand(_))
        ));
    }

    #[test]
    fn test_org_display_scratch_detection() {
        let display: OrgDisplay = serde_json::from_value(serde_json::json!({
            "id": "00D000000000001",
            "instanceUrl": "https://scratch.my.salesforce.com",
            "username": "test@example.com",
            "devHubId": "hub@example.com"
        }))
        .unwrap();
        let org = SfdxOrg {
            cli: SfdxCli::default(),
            display,
        };
        assert!(org.is_scratch_org());
        assert_eq!(org.config().org_id, "00D000000000001");
        assert!(org.ensure_scratch_org().is_ok());
    }

    #[test]
    fn test_non_scratch_org_rejected() {
        let org = SfdxOrg {
            cli: SfdxCli::default(),
            display: OrgDisplay {
                username: "prod@example.com".to_string(),
                ..Default::default()
            },
        };
        let err = org.ensure_scratch_org().unwrap_err();
        assert!(matches!(err, RunError::NotScratchOrg(_)));
    }

    #[test]
    fn test_install_args() {
        let args = install_args("04t000000000001", 2);
        assert_eq!(
            args,
            [
                "force:package:install",
                "--wait",
                "2",
                "--package",
                "04t000000000001",
                "--securitytype",
                "AllUsers"
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_reads_org_display() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sfdx");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '{\"status\": 0, \"result\": {\"id\": \"00D000000000001\", \"instanceUrl\": \"https://scratch.my.salesforce.com\", \"username\": \"test@example.com\", \"devHubId\": \"hub@example.com\"}}'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cli = SfdxCli::with_binary(script.display().to_string());
        let org = SfdxOrg::connect(cli, Some("test@example.com")).await.unwrap();

        assert_eq!(org.username(), "test@example.com");
        assert!(org.is_scratch_org());
        assert_eq!(
            org.config().instance_url,
            "https://scratch.my.salesforce.com"
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_org_error() {
        let cli = SfdxCli::with_binary("lts-definitely-not-a-real-binary");
        let err = cli.run_json(&["force:org:display".to_string()]).await.unwrap_err();
        assert!(matches!(err, RunError::OrgCommand(_)));
    }
}
