//! `SignOrchestrator` drives one signing run.
//!
//! Generates the signing project, overwrites `<run>/build.proj`, runs the
//! build engine against it and turns the exit code into a result.

use crate::adapters::engine::{BuildEngine, CancelToken, EngineInvocation, MsBuildEngine};
use crate::domain::constants::DEFAULT_VERBOSITY;
use crate::domain::manifest::{ManifestDocument, ManifestSettings};
use crate::domain::types::{SignLayout, SigningRequest};
use crate::infra::config::SignConfiguration;
use crate::infra::error::{SigningError, SigningResult};
use crate::infra::progress::{LogProgress, ProgressReporter, TextBlock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct SignReport {
    pub manifest_path: PathBuf,
    pub files: usize,
    pub duration: Duration,
    /// Captured engine output; minimal verbosity keeps it short
    pub output: String,
}

pub struct SignOrchestrator {
    layout: SignLayout,
    manifest_path: PathBuf,
    settings: ManifestSettings,
    verbosity: String,
    engine: Box<dyn BuildEngine>,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancelToken,
}

impl SignOrchestrator {
    /// Orchestrator with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `EngineNotFound` if MSBuild is not installed where expected.
    pub fn new(
        run_path: impl Into<PathBuf>,
        binaries_path: impl Into<PathBuf>,
        source_path: impl Into<PathBuf>,
    ) -> SigningResult<Self> {
        Self::from_config(
            SignLayout::new(run_path, binaries_path, source_path),
            &SignConfiguration::default(),
        )
    }

    /// Resolve the engine from `config` and build an orchestrator around it.
    ///
    /// Nothing is written to disk when resolution fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for invalid settings and `EngineNotFound`
    /// when no engine candidate exists.
    pub fn from_config(layout: SignLayout, config: &SignConfiguration) -> SigningResult<Self> {
        config.validate()?;
        let program = config.engine.locator().locate()?;
        log::info!("Using MSBuild at {}", program.display());

        let engine = MsBuildEngine::new(program, config.engine.options());
        Ok(
            Self::with_engine(layout, config.manifest.clone(), Box::new(engine))
                .with_verbosity(config.engine.verbosity.clone()),
        )
    }

    /// Orchestrator around an already resolved engine; performs no lookup.
    pub fn with_engine(
        layout: SignLayout,
        settings: ManifestSettings,
        engine: Box<dyn BuildEngine>,
    ) -> Self {
        let manifest_path = layout.manifest_path();
        Self {
            layout,
            manifest_path,
            settings,
            verbosity: DEFAULT_VERBOSITY.to_string(),
            engine,
            reporter: Arc::new(LogProgress),
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: impl Into<String>) -> Self {
        self.verbosity = verbosity.into();
        self
    }

    /// Token that aborts a running [`sign`](Self::sign) from another thread.
    ///
    /// Cancellation is permanent: once cancelled, every later `sign` call on
    /// this orchestrator returns `Cancelled` without writing the manifest or
    /// starting the engine.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn layout(&self) -> &SignLayout {
        &self.layout
    }

    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    #[must_use]
    pub fn engine_path(&self) -> &Path {
        self.engine.program()
    }

    /// How the engine will be invoked.
    #[must_use]
    pub fn invocation(&self) -> EngineInvocation {
        EngineInvocation::new(&self.manifest_path, &self.layout.run_path)
            .with_target(self.settings.target_name.clone())
            .with_verbosity(self.verbosity.clone())
    }

    /// Generate the manifest for `request` without writing it.
    ///
    /// The temporary directory is queried once, here.
    pub fn generate_manifest(&self, request: &SigningRequest) -> SigningResult<ManifestDocument> {
        let intermediates = std::env::temp_dir();
        ManifestDocument::generate(&self.settings, &self.layout, &intermediates, request)
    }

    /// Sign every file in `request` with one engine run.
    ///
    /// Calls against the same run directory must not overlap: each one
    /// overwrites the same `build.proj`.
    ///
    /// # Errors
    ///
    /// Returns `EngineFailed` with the exit code and captured output when the
    /// engine exits non-zero, after the output has been reported. Manifest,
    /// spawn, timeout and cancellation failures are returned as is.
    pub fn sign(&self, request: &SigningRequest) -> SigningResult<SignReport> {
        let start = Instant::now();
        let invocation = self.invocation();

        self.reporter
            .set_message(&invocation.command_line(self.engine.program()));

        let manifest = self.generate_manifest(request)?;
        self.check_cancelled()?;
        manifest.write_to(&self.manifest_path)?;
        self.reporter.show_block(TextBlock::Manifest, manifest.as_str());

        self.check_cancelled()?;
        let result = match self.engine.run(&invocation, &self.cancel) {
            Ok(result) => result,
            Err(e) => {
                self.reporter.finish_with_error(&e.to_string());
                return Err(e);
            }
        };

        if !result.success() {
            self.reporter.show_block(TextBlock::EngineOutput, &result.output);
            let error = SigningError::EngineFailed {
                exit_code: result.exit_code,
                output: result.output,
                manifest_path: self.manifest_path.clone(),
            };
            self.reporter.finish_with_error(&error.to_string());
            return Err(error);
        }

        self.reporter.finish();
        Ok(SignReport {
            manifest_path: self.manifest_path.clone(),
            files: manifest.file_count(),
            duration: start.elapsed(),
            output: result.output,
        })
    }

    fn check_cancelled(&self) -> SigningResult<()> {
        if self.cancel.is_cancelled() {
            log::warn!("Signing cancelled before MSBuild was started");
            self.reporter
                .finish_with_error(&SigningError::Cancelled.to_string());
            return Err(SigningError::Cancelled);
        }
        Ok(())
    }
}
