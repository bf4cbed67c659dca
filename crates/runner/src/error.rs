//! Error types for test runs

use std::path::PathBuf;
use thiserror::Error;

/// Broad failure classes a caller can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ServerLifecycle,
    Session,
    Extraction,
    RetrievalFailed,
    Artifact,
    Release,
    Install,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid result format '{value}'. Valid formats are: {valid}")]
    InvalidReporter { value: String, valid: String },

    #[error("Unable to read config file {path}: {source}")]
    ConfigFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {path}: {reason}")]
    ConfigFileParse { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{runtime} is required to run the automation server but could not be executed: {detail}")]
    MissingRuntime { runtime: String, detail: String },

    #[error("Automation server install failed: {0}")]
    ServerInstall(String),

    #[error("Automation server failed to start: {0}")]
    ServerStartup(String),

    #[error("Automation server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Unable to prepare output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Browser session error: {0}")]
    Session(String),

    #[error("WebDriver command {command} failed: {error}: {message}")]
    WebDriver {
        command: String,
        error: String,
        message: String,
    },

    #[error("Error retrieving front door url: {0}")]
    FrontDoorUrl(String),

    #[error("Org command failed: {0}")]
    OrgCommand(String),

    #[error("Results not found on page or operation timed out after {timeout_ms} ms")]
    ResultsNotFound { timeout_ms: u64 },

    #[error("Malformed test results: {0}")]
    MalformedResults(#[source] serde_json::Error),

    #[error("Test result retrieval failed: {0}")]
    ResultRetrievalFailed(String),

    #[error("test run error: {0}")]
    TestRun(#[source] Box<RunError>),

    #[error("Failed to write {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to retrieve the package id from {0}")]
    ReleaseUnreachable(String),

    #[error("Release version {0} was not found")]
    ReleaseVersionNotFound(String),

    #[error("Invalid package type '{0}'. Valid types are: jasmine, mocha, full")]
    InvalidPackageType(String),

    #[error("Unable to extract the package id from the release notes at {0}")]
    PackageIdNotFound(String),

    #[error("Package install failed: {0}")]
    PackageInstall(String),

    #[error("Operation requires a scratch org: {0}")]
    NotScratchOrg(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Wrap a failure from an external call with the stable test-run label.
    /// Already-wrapped errors are returned unchanged.
    pub fn test_run(err: RunError) -> Self {
        match err {
            RunError::TestRun(_) => err,
            other => RunError::TestRun(Box::new(other)),
        }
    }

    /// The error without any test-run wrapper.
    pub fn root(&self) -> &RunError {
        match self {
            RunError::TestRun(inner) => inner.root(),
            other => other,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RunError::TestRun(inner) => inner.category(),
            RunError::InvalidReporter { .. }
            | RunError::ConfigFileRead { .. }
            | RunError::ConfigFileParse { .. }
            | RunError::InvalidConfig(_)
            | RunError::NotScratchOrg(_) => ErrorCategory::Configuration,
            RunError::MissingRuntime { .. }
            | RunError::ServerInstall(_)
            | RunError::ServerStartup(_)
            | RunError::ServerHealthCheck(_)
            | RunError::OutputDirectory { .. } => ErrorCategory::ServerLifecycle,
            RunError::Session(_)
            | RunError::WebDriver { .. }
            | RunError::FrontDoorUrl(_)
            | RunError::OrgCommand(_)
            | RunError::Http(_) => ErrorCategory::Session,
            RunError::ResultsNotFound { .. }
            | RunError::MalformedResults(_)
            | RunError::Json(_) => ErrorCategory::Extraction,
            RunError::ResultRetrievalFailed(_) => ErrorCategory::RetrievalFailed,
            RunError::Artifact { .. } | RunError::Io(_) => ErrorCategory::Artifact,
            RunError::ReleaseUnreachable(_)
            | RunError::ReleaseVersionNotFound(_)
            | RunError::InvalidPackageType(_)
            | RunError::PackageIdNotFound(_) => ErrorCategory::Release,
            RunError::PackageInstall(_) => ErrorCategory::Install,
        }
    }

    /// Short stable name, used as the `name` field of JSON error envelopes.
    pub fn name(&self) -> &'static str {
        match self.root() {
            RunError::InvalidReporter { .. } => "InvalidReporterError",
            RunError::MissingRuntime { .. } => "MissingRuntimeError",
            RunError::ResultsNotFound { .. } => "ResultsNotFoundError",
            RunError::ResultRetrievalFailed(_) => "TestResultRetrievalFailed",
            RunError::NotScratchOrg(_) => "ScratchOrgOnlyError",
            _ => match self {
                RunError::TestRun(_) => "TestRunError",
                _ => match self.category() {
                    ErrorCategory::Configuration => "ConfigurationError",
                    ErrorCategory::ServerLifecycle => "ServerLifecycleError",
                    ErrorCategory::Session => "SessionError",
                    ErrorCategory::Extraction => "ExtractionError",
                    ErrorCategory::RetrievalFailed => "TestResultRetrievalFailed",
                    ErrorCategory::Artifact => "ArtifactError",
                    ErrorCategory::Release => "ReleaseError",
                    ErrorCategory::Install => "PackageInstallError",
                },
            },
        }
    }
}

pub type RunResult<T> = Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_run_wrapper_keeps_original_message() {
        let err = RunError::test_run(RunError::ResultsNotFound { timeout_ms: 5000 });
        let text = err.to_string();
        assert!(text.starts_with("test run error: "));
        assert!(text.contains("5000 ms"));
        assert!(err.source().is_some());
        assert_eq!(err.category(), ErrorCategory::Extraction);
    }

    #[test]
    fn test_run_wrapper_is_applied_once() {
        let err = RunError::test_run(RunError::test_run(RunError::Session("gone".into())));
        match err {
            RunError::TestRun(inner) => assert!(matches!(*inner, RunError::Session(_))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_retrieval_failed_is_distinct_from_extraction() {
        let retrieval = RunError::ResultRetrievalFailed("no results".into());
        let extraction = RunError::ResultsNotFound { timeout_ms: 1 };
        assert_ne!(retrieval.category(), extraction.category());
        assert_eq!(retrieval.name(), "TestResultRetrievalFailed");
    }
}
