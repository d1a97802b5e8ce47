//! Build engine discovery.
//!
//! The engine is resolved from an explicit, ordered candidate list. The
//! default list holds a single entry: MSBuild 14.0 below the 32-bit program
//! files folder.

use crate::domain::constants::{
    ENGINE_RELATIVE_PATH, PROGRAM_FILES_X86_FALLBACK, PROGRAM_FILES_X86_VAR,
};
use crate::infra::error::{SigningError, SigningResult};
use std::path::{Path, PathBuf};

/// Ordered list of places the build engine may live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLocator {
    candidates: Vec<PathBuf>,
}

impl EngineLocator {
    /// Search the given candidates in order.
    #[must_use]
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// Use exactly one path, no fallback.
    pub fn with_override(path: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![path.into()],
        }
    }

    /// The platform default: `%ProgramFiles(x86)%\MSBuild\14.0\Bin\MSBuild.exe`.
    #[must_use]
    pub fn platform_default() -> Self {
        Self::with_override(Self::default_engine_path())
    }

    /// Default engine location for this host.
    #[must_use]
    pub fn default_engine_path() -> PathBuf {
        let program_files = std::env::var_os(PROGRAM_FILES_X86_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(PROGRAM_FILES_X86_FALLBACK));
        program_files.join(ENGINE_RELATIVE_PATH)
    }

    #[must_use]
    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Return the first candidate that exists as a file.
    ///
    /// # Errors
    ///
    /// Returns `EngineNotFound` listing every attempted path.
    pub fn locate(&self) -> SigningResult<PathBuf> {
        for candidate in &self.candidates {
            if is_engine(candidate) {
                log::debug!("Found MSBuild at {}", candidate.display());
                return Ok(candidate.clone());
            }
            log::debug!("MSBuild not present at {}", candidate.display());
        }

        let error = SigningError::EngineNotFound {
            attempted: self.candidates.clone(),
        };
        log::error!("{error}");
        Err(error)
    }
}

impl Default for EngineLocator {
    fn default() -> Self {
        Self::platform_default()
    }
}

fn is_engine(path: &Path) -> bool {
    path.is_file()
}
