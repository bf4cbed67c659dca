//! Run configuration and automation server options

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RunError, RunResult};

/// Default completion timeout for the in-page test run.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// App loaded when no application name is configured.
pub const DEFAULT_APP_NAME: &str = "jasmineTests";

/// Immutable input to a single test run.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Reporter format name; `None` selects the human reporter
    pub result_format: Option<String>,

    /// Optional server options file
    pub config_file: Option<PathBuf>,

    /// Directory to write JUnit and JSON artifacts to
    pub output_dir: Option<PathBuf>,

    /// Username or alias of the org to test against
    pub target_username: Option<String>,

    /// Machine-readable process output
    pub json: bool,

    /// How long to wait for the results container to fill in
    pub timeout_ms: u64,

    /// Test application name (`/c/<name>.app`)
    pub app_name: Option<String>,

    /// Keep the browser session alive after the run
    pub leave_browser_open: bool,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            result_format: None,
            config_file: None,
            output_dir: None,
            target_username: None,
            json: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            app_name: None,
            leave_browser_open: false,
        }
    }
}

impl RunConfiguration {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Relative path of the test application, always ending in `.app`.
    pub fn app_path(&self) -> String {
        let name = self.app_name.as_deref().unwrap_or(DEFAULT_APP_NAME);
        let mut path = format!("/c/{}", name);
        if !path.contains(".app") {
            path.push_str(".app");
        }
        path
    }
}

/// Host platform, as far as install locations are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Base directory for the server jar and browser drivers.
///
/// The working-directory default is not writable from a packaged install on
/// Windows, so that platform uses the temp directory instead.
pub fn install_dir_for(platform: Platform) -> PathBuf {
    match platform {
        Platform::Windows => std::env::temp_dir().join("selenium"),
        Platform::Unix => PathBuf::from(".selenium"),
    }
}

/// Browser driver download settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverOptions {
    pub version: String,

    #[serde(rename = "baseURL", default = "default_driver_base_url")]
    pub base_url: String,

    /// Platform suffix of the driver archive (`linux64`, `mac64`, `win32`)
    #[serde(default = "default_driver_arch")]
    pub arch: String,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            version: "87.0.4280.88".to_string(),
            base_url: default_driver_base_url(),
            arch: default_driver_arch(),
        }
    }
}

fn default_driver_base_url() -> String {
    "https://chromedriver.storage.googleapis.com".to_string()
}

fn default_driver_arch() -> String {
    if cfg!(windows) {
        "win32".to_string()
    } else if cfg!(target_os = "macos") {
        "mac64".to_string()
    } else {
        "linux64".to_string()
    }
}

/// Options for installing and starting the automation server, loadable from
/// the run's config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerOptions {
    /// Install directory; resolved per platform when absent
    pub base_path: Option<PathBuf>,

    /// Selenium server version
    pub version: String,

    /// Release mirror for the server jar
    #[serde(rename = "baseURL")]
    pub base_url: String,

    /// Drivers to install, keyed by browser name. Only `chrome` is started.
    pub drivers: BTreeMap<String, DriverOptions>,

    /// Extra JVM arguments
    pub java_args: Vec<String>,

    /// Extra server arguments
    pub selenium_args: Vec<String>,

    /// Port the server listens on
    pub port: u16,

    /// Seconds to wait for the server to report healthy
    pub startup_timeout: u64,
}

impl Default for ServerOptions {
    fn default() -> Self {
        let mut drivers = BTreeMap::new();
        drivers.insert("chrome".to_string(), DriverOptions::default());
        Self {
            base_path: None,
            version: "3.141.59".to_string(),
            base_url: "https://selenium-release.storage.googleapis.com".to_string(),
            drivers,
            java_args: Vec::new(),
            selenium_args: Vec::new(),
            port: 4444,
            startup_timeout: 30,
        }
    }
}

impl ServerOptions {
    /// Load options from a JSON file, or TOML when the extension says so.
    pub fn load(path: &Path) -> RunResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| RunError::ConfigFileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = if path.extension().map(|e| e == "toml").unwrap_or(false) {
            toml::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|reason| RunError::ConfigFileParse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Install directory, falling back to the platform default.
    pub fn resolve_base_path(&self, platform: Platform) -> PathBuf {
        self.base_path
            .clone()
            .unwrap_or_else(|| install_dir_for(platform))
    }

    pub fn chrome_driver(&self) -> DriverOptions {
        self.drivers.get("chrome").cloned().unwrap_or_default()
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout)
    }
}
