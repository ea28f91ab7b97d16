//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources replace individual keys of earlier ones; tables are merged
//! key by key rather than replaced wholesale.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Default store location: the platform cache directory, or `.outcache/store`
/// when no home directory can be determined.
pub fn default_store_path() -> PathBuf {
    ProjectDirs::from("", "", "outcache")
        .map(|dirs| dirs.cache_dir().join("store"))
        .unwrap_or_else(|| PathBuf::from(".outcache").join("store"))
}

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.backend", "disk")?
        .set_default(
            "storage.path",
            default_store_path().to_string_lossy().into_owned(),
        )?
        .set_default(
            "transfer.copy_buffer_size",
            crate::buffer::DEFAULT_BUFFER_SIZE as u64,
        )
}
