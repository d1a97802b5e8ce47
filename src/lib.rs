//! Roslyn Signing Library
//!
//! Signs a batch of binaries by generating an MSBuild project that invokes the
//! MicroBuild `SignFiles` task and running MSBuild against it. Cryptography,
//! certificates and signing policy all stay with the external backend.
//!
//! # Architecture
//!
//! - [`domain`]: signing requests, run layout and manifest generation
//! - [`adapters`]: MSBuild discovery and process invocation
//! - [`pipelines`]: the signing workflow
//! - [`infra`]: configuration, errors and progress reporting

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;

pub use adapters::engine::{
    BuildEngine, CancelToken, EngineInvocation, EngineOptions, ExecutionResult, MsBuildEngine,
};
pub use adapters::locator::EngineLocator;
pub use domain::manifest::{ManifestDocument, ManifestSettings};
pub use domain::types::{SignLayout, SigningRequest};
pub use infra::config::{ConfigManager, SignConfiguration};
pub use infra::error::{SigningError, SigningResult};
pub use infra::progress::{ProgressReporter, ProgressStyle, TextBlock};
pub use pipelines::sign::{SignOrchestrator, SignReport};

/// Sign `files` with the default configuration.
///
/// Convenience wrapper over [`SignOrchestrator::new`] and
/// [`SignOrchestrator::sign`].
///
/// # Errors
///
/// Fails when MSBuild cannot be found or the signing run fails.
pub fn sign_files<I, S>(
    run_path: impl Into<std::path::PathBuf>,
    binaries_path: impl Into<std::path::PathBuf>,
    source_path: impl Into<std::path::PathBuf>,
    files: I,
) -> SigningResult<SignReport>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let orchestrator = SignOrchestrator::new(run_path, binaries_path, source_path)?;
    orchestrator.sign(&SigningRequest::new(files))
}
