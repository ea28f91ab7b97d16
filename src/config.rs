//! Configuration System
//!
//! Layered configuration for the cache: built-in defaults, then the global
//! config file, then the workspace config file, then `OUTCACHE__*` environment
//! variables. Tests included.

use crate::error::CacheError;
use crate::logging::LoggingConfig;
use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

mod merge;
mod sources;

pub use merge::merge_policy::default_store_path;
pub use sources::global_file::global_config_path;
pub use sources::workspace_file::workspace_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub transfer: TransferConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Content store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Sharded files under the store root
    #[default]
    Disk,
    /// Embedded sled database
    Sled,
}

/// Where and how entries are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_store_path(),
        }
    }
}

/// Settings for copying blobs out of the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Size of each pooled copy buffer, in bytes
    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,
}

fn default_copy_buffer_size() -> usize {
    crate::buffer::DEFAULT_BUFFER_SIZE
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            copy_buffer_size: default_copy_buffer_size(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Storage(String),
    Transfer(String),
    Logging(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Transfer(msg) => write!(f, "Transfer: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl CacheConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Store path cannot be empty".to_string(),
            ));
        }
        if self.transfer.copy_buffer_size == 0 {
            errors.push(ValidationError::Transfer(
                "Copy buffer size must be greater than zero".to_string(),
            ));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Loads [`CacheConfig`] from all sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// A relative store path is resolved against `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<CacheConfig, CacheError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(environment());

        let mut config: CacheConfig = builder.build()?.try_deserialize()?;
        if config.storage.path.is_relative() {
            config.storage.path = workspace_root.join(&config.storage.path);
        }
        validated(config)
    }

    /// Load from one explicit file (plus defaults and environment), ignoring
    /// the global and workspace files.
    pub fn load_from_file(path: &Path) -> Result<CacheConfig, CacheError> {
        if !path.is_file() {
            return Err(CacheError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config: CacheConfig = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).required(true))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        validated(config)
    }

    /// Defaults plus environment only
    pub fn load_defaults() -> Result<CacheConfig, CacheError> {
        let config: CacheConfig = Config::builder()
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        validated(config)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("OUTCACHE")
        .separator("__")
        .try_parsing(true)
}

fn validated(config: CacheConfig) -> Result<CacheConfig, CacheError> {
    config.validate().map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        CacheError::ConfigError(format!(
            "Configuration validation failed:\n{}",
            messages.join("\n")
        ))
    })?;
    Ok(config)
}
