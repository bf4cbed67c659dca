//! Locating installable test framework packages from the release feed

use regex::RegexBuilder;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{RunError, RunResult};

const RELEASES_URL: &str =
    "https://api.github.com/repos/forcedotcom/LightningTestingService/releases";

/// Which flavour of the test framework package to install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageType {
    Jasmine,
    Mocha,
    /// Both frameworks plus the example suites
    #[default]
    Full,
}

impl PackageType {
    /// Text that identifies this package's link in the release notes.
    fn link_label(self) -> &'static str {
        match self {
            PackageType::Jasmine => "jasmine",
            PackageType::Mocha => "mocha",
            PackageType::Full => "examples",
        }
    }
}

impl FromStr for PackageType {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jasmine" => Ok(PackageType::Jasmine),
            "mocha" => Ok(PackageType::Mocha),
            "full" => Ok(PackageType::Full),
            _ => Err(RunError::InvalidPackageType(s.to_string())),
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageType::Jasmine => write!(f, "jasmine"),
            PackageType::Mocha => write!(f, "mocha"),
            PackageType::Full => write!(f, "full"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

/// Client for the framework's release feed
pub struct ReleaseClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for ReleaseClient {
    fn default() -> Self {
        Self::with_base_url(RELEASES_URL)
    }
}

impl ReleaseClient {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Release URL for a version; `None` and `latest` both mean the newest.
    pub fn release_url(&self, version: Option<&str>) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), release_path(version))
    }

    /// Look up the package id for `package_type` in the notes of a release.
    pub async fn package_id(
        &self,
        version: Option<&str>,
        package_type: PackageType,
    ) -> RunResult<String> {
        let url = self.release_url(version);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, "LTS")
            .send()
            .await
            .map_err(|e| RunError::ReleaseUnreachable(format!("{} ({})", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RunError::ReleaseUnreachable(format!("{} ({})", url, e)))?;

        if status == reqwest::StatusCode::NOT_FOUND && is_not_found(&body) {
            return Err(RunError::ReleaseVersionNotFound(release_path(version)));
        }
        if !status.is_success() {
            debug!("Unable to reach {}. status={}, body={}", url, status, body);
            return Err(RunError::ReleaseUnreachable(url));
        }
        if is_not_found(&body) {
            return Err(RunError::ReleaseVersionNotFound(release_path(version)));
        }

        let release: Release = serde_json::from_str(&body)?;
        let notes = release.body.unwrap_or_default();
        extract_package_id(&notes, package_type).ok_or_else(|| {
            debug!("Unable to map {} to a package id using the release notes: {}", package_type, notes);
            RunError::PackageIdNotFound(url)
        })
    }
}

fn release_path(version: Option<&str>) -> String {
    match version {
        Some(v) if v != "latest" => format!("tags/{}", v),
        _ => "latest".to_string(),
    }
}

fn is_not_found(body: &str) -> bool {
    serde_json::from_str::<Release>(body)
        .ok()
        .and_then(|r| r.message)
        .map(|m| m == "Not Found")
        .unwrap_or(false)
}

/// Find the 15-character package id in a markdown link whose label mentions
/// the package type, e.g. `[Jasmine](https://login.salesforce.com/packaging/installPackage.apexp?p0=04t6A000002ZGdg)`.
pub fn extract_package_id(notes: &str, package_type: PackageType) -> Option<String> {
    let pattern = format!(r"\[.*{}.*\]\(.*p0=(\w{{15}}).*\)", package_type.link_label());
    let regex = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()?;

    regex
        .captures(notes)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.trim().is_empty())
}
