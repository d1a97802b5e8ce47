//! Error handling types and result definitions for signing operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Error types for manifest generation and build engine invocation
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    #[error("Unable to locate MSBuild at the path(s): {}", display_paths(.attempted))]
    #[diagnostic(help(
        "install MSBuild 14.0 or point `engine_path` in the configuration at an existing MSBuild.exe"
    ))]
    EngineNotFound { attempted: Vec<PathBuf> },

    #[error("Sign failed: MSBuild exited with {} (project {})", display_exit(.exit_code), .manifest_path.display())]
    EngineFailed {
        exit_code: Option<i32>,
        output: String,
        manifest_path: PathBuf,
    },

    #[error("Sign failed: MSBuild did not finish within {}s (project {})", .timeout.as_secs(), .manifest_path.display())]
    EngineTimedOut {
        timeout: Duration,
        manifest_path: PathBuf,
    },

    #[error("Sign cancelled before MSBuild finished")]
    Cancelled,

    #[error("Failed to start MSBuild: {0}")]
    SpawnError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Manifest generation error: {0}")]
    ManifestError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl SigningError {
    /// Exit code of the build engine, when the failure came from a finished process.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SigningError::EngineFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    /// Captured engine output attached to the failure, if any.
    #[must_use]
    pub fn engine_output(&self) -> Option<&str> {
        match self {
            SigningError::EngineFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "<no candidates configured>".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
