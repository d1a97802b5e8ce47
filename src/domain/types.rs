//! Type-safe wrappers for signing inputs.

use crate::domain::constants::MANIFEST_FILE_NAME;
use crate::infra::error::{SigningError, SigningResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// Ordered list of files handed to the signing backend.
///
/// Order is kept as given and duplicates are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningRequest(Vec<String>);

impl SigningRequest {
    /// Create a request from path strings.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SigningRequest(paths.into_iter().map(Into::into).collect())
    }

    /// Create a request from filesystem paths.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a path is not valid UTF-8, since it could not
    /// be written into the manifest unchanged.
    pub fn from_paths<I, P>(paths: I) -> SigningResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let files = paths
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                p.to_str().map(str::to_string).ok_or_else(|| {
                    SigningError::InvalidInput(format!(
                        "Path is not valid UTF-8: {}",
                        p.display()
                    ))
                })
            })
            .collect::<SigningResult<Vec<_>>>()?;
        Ok(SigningRequest(files))
    }

    /// Read a request from a file list: one path per line, blank lines and
    /// `#` comments skipped.
    #[must_use]
    pub fn parse_file_list(content: &str) -> Self {
        SigningRequest(
            content
                .lines()
                .map(|line| line.trim().trim_end_matches('\r'))
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect(),
        )
    }

    /// Append more files, keeping order.
    pub fn extend<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.extend(paths.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SigningRequest {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        SigningRequest::new(iter)
    }
}

/// Directories a signing run works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignLayout {
    /// Working directory of MSBuild; the manifest is written here.
    pub run_path: PathBuf,
    /// Output root for signed binaries, passed to the signing task.
    pub binaries_path: PathBuf,
    /// Source-tree root, used to locate the settings import.
    pub source_path: PathBuf,
}

impl SignLayout {
    pub fn new(
        run_path: impl Into<PathBuf>,
        binaries_path: impl Into<PathBuf>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            run_path: run_path.into(),
            binaries_path: binaries_path.into(),
            source_path: source_path.into(),
        }
    }

    /// `<run_path>/build.proj`, independent of any request.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.run_path.join(MANIFEST_FILE_NAME)
    }
}

impl fmt::Display for SignLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run={} binaries={} source={}",
            self.run_path.display(),
            self.binaries_path.display(),
            self.source_path.display()
        )
    }
}
