//! Automation server management - installing, spawning and health checking
//! the local Selenium server

use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{DriverOptions, Platform, ServerOptions};
use crate::error::{RunError, RunResult};

/// Lifecycle of the server owned by one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Uninstalled,
    Installing,
    Installed,
    Starting,
    Running,
    Terminated,
}

/// The process that brokers browser sessions for a run.
#[async_trait]
pub trait AutomationServer: Send {
    /// Install if needed, then start and wait until the server accepts sessions.
    async fn start(&mut self, options: &ServerOptions) -> RunResult<()>;

    /// Terminate the server. Safe to call when never started or already stopped.
    async fn kill(&mut self);

    fn state(&self) -> ServerState;
}

/// Selenium standalone server running under a local JVM
pub struct SeleniumServer {
    platform: Platform,
    http: reqwest::Client,
    child: Option<Child>,
    state: ServerState,
}

impl SeleniumServer {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            http: reqwest::Client::new(),
            child: None,
            state: ServerState::Uninstalled,
        }
    }

    fn transition(&mut self, next: ServerState) {
        debug!("Automation server {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Install the server jar and chrome driver if they are missing.
    async fn install(&mut self, options: &ServerOptions, layout: &InstallLayout) -> RunResult<()> {
        // Both install and start need a JVM; fail with an actionable error up front.
        check_java().await?;

        if layout.is_installed() {
            debug!("Automation server already installed at {}", layout.base.display());
            self.transition(ServerState::Installed);
            return Ok(());
        }

        self.transition(ServerState::Installing);
        info!("Installing automation server into {}", layout.base.display());

        if !layout.server_jar.exists() {
            let url = server_jar_url(options);
            let bytes = self.download(&url).await?;
            write_file(&layout.server_jar, &bytes).await?;
        }

        if !layout.chrome_driver.exists() {
            let driver = options.chrome_driver();
            let url = driver_archive_url(&driver);
            let archive = self.download(&url).await?;
            let binary = extract_driver(&archive)?;
            write_file(&layout.chrome_driver, &binary).await?;
            make_executable(&layout.chrome_driver)?;
        }

        self.transition(ServerState::Installed);
        Ok(())
    }

    async fn download(&self, url: &str) -> RunResult<Vec<u8>> {
        debug!("Downloading {}", url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RunError::ServerInstall(format!("Failed to download {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(RunError::ServerInstall(format!(
                "Failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RunError::ServerInstall(format!("Failed to download {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }

    async fn spawn(&mut self, options: &ServerOptions, layout: &InstallLayout) -> RunResult<()> {
        self.transition(ServerState::Starting);

        let args = build_args(options, layout);
        debug!("Automation server command: java {}", args.join(" "));

        let child = Command::new("java")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunError::ServerStartup(format!("Failed to spawn java: {}", e)))?;

        info!(
            "Automation server started with PID {}",
            child.id().unwrap_or_default()
        );
        self.child = Some(child);

        self.wait_for_healthy(options).await?;
        self.transition(ServerState::Running);
        Ok(())
    }

    /// Poll the hub status endpoint until it answers or the server dies.
    async fn wait_for_healthy(&mut self, options: &ServerOptions) -> RunResult<()> {
        let status_url = format!("http://localhost:{}/wd/hub/status", options.port);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| RunError::ServerStartup(format!("Cannot build health check client: {}", e)))?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < options.startup_timeout() {
            attempts += 1;

            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(RunError::ServerStartup(format!(
                        "Server process exited early with {}",
                        status
                    )));
                }
            }

            match client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Automation server is healthy at {}", status_url);
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Automation server status returned {}", resp.status());
                }
                Err(e) => {
                    // Connection refused is expected while the JVM boots
                    if !e.is_connect() {
                        warn!("Automation server status error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(250)).await;
        }

        Err(RunError::ServerHealthCheck(attempts))
    }
}

#[async_trait]
impl AutomationServer for SeleniumServer {
    async fn start(&mut self, options: &ServerOptions) -> RunResult<()> {
        let layout = InstallLayout::new(options.resolve_base_path(self.platform), options);
        self.install(options, &layout).await?;
        self.spawn(options, &layout).await
    }

    async fn kill(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        info!("Stopping automation server (pid: {:?})", child.id());

        // Try graceful shutdown first
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && timeout(Duration::from_millis(500), child.wait()).await.is_ok()
                {
                    self.transition(ServerState::Terminated);
                    return;
                }
            }
        }

        // Force kill if still running
        let _ = child.start_kill();
        let _ = child.wait().await;
        self.transition(ServerState::Terminated);
    }

    fn state(&self) -> ServerState {
        self.state
    }
}

/// Where the installed artifacts live under the base directory
#[derive(Debug, Clone)]
pub struct InstallLayout {
    pub base: PathBuf,
    pub server_jar: PathBuf,
    pub chrome_driver: PathBuf,
}

impl InstallLayout {
    pub fn new(base: PathBuf, options: &ServerOptions) -> Self {
        let driver = options.chrome_driver();
        let exe = if cfg!(windows) { ".exe" } else { "" };
        Self {
            server_jar: base
                .join("selenium-server")
                .join(format!("{}-server.jar", options.version)),
            chrome_driver: base
                .join("chromedriver")
                .join(format!("{}-{}-chromedriver{}", driver.version, driver.arch, exe)),
            base,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.server_jar.is_file() && self.chrome_driver.is_file()
    }
}

/// `3.141.59` is published under `3.141/selenium-server-standalone-3.141.59.jar`.
pub fn server_jar_url(options: &ServerOptions) -> String {
    let release = options
        .version
        .splitn(3, '.')
        .take(2)
        .collect::<Vec<_>>()
        .join(".");
    format!(
        "{}/{}/selenium-server-standalone-{}.jar",
        options.base_url.trim_end_matches('/'),
        release,
        options.version
    )
}

pub fn driver_archive_url(driver: &DriverOptions) -> String {
    format!(
        "{}/{}/chromedriver_{}.zip",
        driver.base_url.trim_end_matches('/'),
        driver.version,
        driver.arch
    )
}

pub fn build_args(options: &ServerOptions, layout: &InstallLayout) -> Vec<String> {
    let mut args = options.java_args.clone();
    args.push(format!(
        "-Dwebdriver.chrome.driver={}",
        layout.chrome_driver.display()
    ));
    args.extend(["-jar".to_string(), layout.server_jar.display().to_string()]);
    args.extend(["-port".to_string(), options.port.to_string()]);
    args.extend(options.selenium_args.iter().cloned());
    args
}

async fn check_java() -> RunResult<()> {
    let result = Command::new("java")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(RunError::MissingRuntime {
            runtime: "Java".to_string(),
            detail: format!("`java -version` exited with {}", status),
        }),
        Err(e) => Err(RunError::MissingRuntime {
            runtime: "Java".to_string(),
            detail: e.to_string(),
        }),
    }
}

/// Pull the driver binary out of its zip archive.
fn extract_driver(archive: &[u8]) -> RunResult<Vec<u8>> {
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive))
        .map_err(|e| RunError::ServerInstall(format!("Invalid driver archive: {}", e)))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| RunError::ServerInstall(format!("Invalid driver archive: {}", e)))?;
        let is_driver = Path::new(entry.name())
            .file_stem()
            .map(|stem| stem == "chromedriver")
            .unwrap_or(false);
        if !entry.is_dir() && is_driver {
            let mut binary = Vec::new();
            entry.read_to_end(&mut binary).map_err(|e| {
                RunError::ServerInstall(format!("Cannot read driver from archive: {}", e))
            })?;
            return Ok(binary);
        }
    }

    Err(RunError::ServerInstall(
        "Driver archive does not contain a chromedriver binary".to_string(),
    ))
}

async fn write_file(path: &Path, bytes: &[u8]) -> RunResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            RunError::ServerInstall(format!("Cannot create {}: {}", parent.display(), e))
        })?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| RunError::ServerInstall(format!("Cannot write {}: {}", path.display(), e)))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> RunResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
        RunError::ServerInstall(format!("Cannot make {} executable: {}", path.display(), e))
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> RunResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_server_jar_url() {
        let options = ServerOptions::default();
        assert_eq!(
            server_jar_url(&options),
            "https://selenium-release.storage.googleapis.com/3.141/selenium-server-standalone-3.141.59.jar"
        );
    }

    #[test]
    fn test_driver_archive_url() {
        let driver = DriverOptions {
            version: "2.45".to_string(),
            base_url: "https://example.test/".to_string(),
            arch: "linux64".to_string(),
        };
        assert_eq!(
            driver_archive_url(&driver),
            "https://example.test/2.45/chromedriver_linux64.zip"
        );
    }

    #[test]
    fn test_build_args_order() {
        let options = ServerOptions {
            java_args: vec!["-Xmx512m".to_string()],
            selenium_args: vec!["-debug".to_string()],
            ..Default::default()
        };
        let layout = InstallLayout::new(PathBuf::from("/sel"), &options);
        let args = build_args(&options, &layout);

        assert_eq!(args[0], "-Xmx512m");
        assert!(args[1].starts_with("-Dwebdriver.chrome.driver=/sel/chromedriver/"));
        assert_eq!(args[2], "-jar");
        assert_eq!(args[3], "/sel/selenium-server/3.141.59-server.jar");
        assert_eq!(&args[4..6], ["-port", "4444"]);
        assert_eq!(args.last().map(String::as_str), Some("-debug"));
    }

    #[test]
    fn test_layout_not_installed_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(dir.path().to_path_buf(), &ServerOptions::default());
        assert!(!layout.is_installed());
    }

    #[test]
    fn test_extract_driver_from_zip() {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default();
            writer.start_file("LICENSE", opts).unwrap();
            writer.write_all(b"license").unwrap();
            writer.start_file("chromedriver", opts).unwrap();
            writer.write_all(b"\x7fELF").unwrap();
            writer.finish().unwrap();
        }

        let binary = extract_driver(buf.get_ref()).unwrap();
        assert_eq!(binary, b"\x7fELF");
    }

    #[test]
    fn test_extract_driver_rejects_garbage() {
        let err = extract_driver(b"not a zip").unwrap_err();
        assert!(matches!(err, RunError::ServerInstall(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable_failure_is_install_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = make_executable(&dir.path().join("missing-chromedriver")).unwrap_err();
        assert!(matches!(err, RunError::ServerInstall(_)));
        assert_eq!(err.category(), crate::error::ErrorCategory::ServerLifecycle);
    }

    #[tokio::test]
    async fn test_kill_without_start_is_noop() {
        let mut server = SeleniumServer::new(Platform::Unix);
        server.kill().await;
        server.kill().await;
        assert_eq!(server.state(), ServerState::Uninstalled);
    }
}
