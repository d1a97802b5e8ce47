//! Configuration management infrastructure.
//!
//! Persists engine discovery, process options and every manifest literal so
//! they can be changed without touching call sites.

use crate::adapters::engine::EngineOptions;
use crate::adapters::locator::EngineLocator;
use crate::domain::constants::DEFAULT_VERBOSITY;
use crate::domain::manifest::ManifestSettings;
use crate::infra::error::{SigningError, SigningResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// MSBuild verbosity values accepted by `/v:`.
const VERBOSITY_LEVELS: [&str; 10] = [
    "q",
    "quiet",
    "m",
    "minimal",
    "n",
    "normal",
    "d",
    "detailed",
    "diag",
    "diagnostic",
];

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignConfiguration {
    /// Build engine discovery and process options
    pub engine: EngineConfiguration,

    /// Literals written into the signing project
    pub manifest: ManifestSettings,
}

/// Build engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfiguration {
    /// Explicit MSBuild path; when set it is the only candidate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_path: Option<String>,

    /// Candidate paths searched in order; empty means the platform default
    pub search_paths: Vec<String>,

    /// Kill MSBuild after this many seconds (0 waits indefinitely)
    pub timeout_seconds: u64,

    /// Capture standard error together with standard output
    pub capture_stderr: bool,

    /// MSBuild verbosity
    pub verbosity: String,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            engine_path: None,
            search_paths: Vec::new(),
            timeout_seconds: 0,
            capture_stderr: false,
            verbosity: DEFAULT_VERBOSITY.to_string(),
        }
    }
}

impl EngineConfiguration {
    /// Locator honouring the override and search list.
    #[must_use]
    pub fn locator(&self) -> EngineLocator {
        if let Some(path) = &self.engine_path {
            return EngineLocator::with_override(path);
        }
        if self.search_paths.is_empty() {
            return EngineLocator::platform_default();
        }
        EngineLocator::new(self.search_paths.iter().map(PathBuf::from).collect())
    }

    /// Process options for the engine adapter.
    #[must_use]
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            timeout: (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds)),
            capture_stderr: self.capture_stderr,
            ..EngineOptions::default()
        }
    }
}

impl SignConfiguration {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` describing the first invalid value.
    pub fn validate(&self) -> SigningResult<()> {
        if !VERBOSITY_LEVELS.contains(&self.engine.verbosity.as_str()) {
            return Err(SigningError::ConfigurationError(format!(
                "Invalid MSBuild verbosity: {}",
                self.engine.verbosity
            )));
        }

        if self
            .engine
            .engine_path
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(SigningError::ConfigurationError(
                "engine_path must not be empty when set".to_string(),
            ));
        }

        self.manifest.validate()
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> SigningResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> SigningResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("sign-roslyn").join("config.toml"))
        } else {
            Ok(PathBuf::from("sign-roslyn-config.toml"))
        }
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the file if it exists; `None` only when there is no file.
    ///
    /// Read, parse and validation failures of an existing file are errors.
    pub fn load_existing(&self) -> SigningResult<Option<SignConfiguration>> {
        if self.config_path.exists() {
            self.load().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Load the file if it exists, otherwise return defaults without writing.
    pub fn load_or_default(&self) -> SigningResult<SignConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                self.config_path.display()
            );
            Ok(SignConfiguration::default())
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> SigningResult<SignConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = SignConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SigningResult<SignConfiguration> {
        log::info!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: SignConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &SignConfiguration) -> SigningResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    SigningError::ConfigurationError(format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> SigningResult<()> {
        let mut config = self.load_or_default()?;
        apply_value(&mut config, key, value)?;
        config.validate()?;
        self.save(&config)
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> SigningResult<String> {
        format.render(&self.load_or_default()?)
    }

    /// Import configuration from a string
    pub fn import_config(&self, content: &str, format: ExportFormat) -> SigningResult<()> {
        let config = format.parse(content)?;
        config.validate()?;
        self.save(&config)
    }
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}

impl ExportFormat {
    fn name(self) -> &'static str {
        match self {
            ExportFormat::Toml => "TOML",
            ExportFormat::Json => "JSON",
            ExportFormat::Yaml => "YAML",
        }
    }

    fn render(self, config: &SignConfiguration) -> SigningResult<String> {
        let rendered = match self {
            ExportFormat::Toml => toml::to_string_pretty(config).map_err(|e| e.to_string()),
            ExportFormat::Json => serde_json::to_string_pretty(config).map_err(|e| e.to_string()),
            ExportFormat::Yaml => serde_yaml::to_string(config).map_err(|e| e.to_string()),
        };
        rendered.map_err(|e| {
            SigningError::ConfigurationError(format!("{} export failed: {e}", self.name()))
        })
    }

    fn parse(self, content: &str) -> SigningResult<SignConfiguration> {
        let parsed = match self {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            ExportFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| {
            SigningError::ConfigurationError(format!("{} import failed: {e}", self.name()))
        })
    }
}

fn apply_value(config: &mut SignConfiguration, key: &str, value: &str) -> SigningResult<()> {
    let text = || value.to_string();
    match key {
        "engine_path" => {
            config.engine.engine_path = (!value.is_empty()).then(text);
        }
        "search_paths" => {
            config.engine.search_paths = value
                .split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        "timeout_seconds" => {
            config.engine.timeout_seconds = value.parse().map_err(|_| {
                SigningError::ConfigurationError(format!("Invalid timeout: {value}"))
            })?;
        }
        "capture_stderr" => {
            config.engine.capture_stderr = value.parse().map_err(|_| {
                SigningError::ConfigurationError(format!("Invalid boolean value: {value}"))
            })?;
        }
        "verbosity" => config.engine.verbosity = text(),
        "settings_import" => config.manifest.settings_import = text(),
        "backend_package" => config.manifest.backend_package = text(),
        "backend_version" => config.manifest.backend_version = text(),
        "certificate_property" => config.manifest.certificate_property = text(),
        "strong_name" => config.manifest.strong_name = text(),
        "target_name" => config.manifest.target_name = text(),
        "sign_type" => config.manifest.sign_type = text(),
        _ => {
            return Err(SigningError::ConfigurationError(format!(
                "Unknown configuration key: {key}"
            )));
        }
    }
    Ok(())
}
