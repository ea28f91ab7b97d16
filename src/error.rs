//! Error types for the task output cache.

use crate::types::ContentHash;
use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("Corrupt entry {hash}: {reason}")]
    CorruptEntry { hash: ContentHash, reason: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors surfaced by the store and load commands
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Entry not found: {0}")]
    EntryNotFound(ContentHash),

    #[error("Invalid entry type for {hash}: expected {expected}, found {found}")]
    InvalidEntryType {
        hash: ContentHash,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Cannot find outputs for property '{0}'")]
    MissingOutputSnapshots(String),

    #[error("Cannot find incoming output snapshots for property '{0}'")]
    MissingIncomingSnapshots(String),

    #[error("Expected exactly one output snapshot for file property '{property}', found {count}")]
    UnexpectedSnapshotCount { property: String, count: usize },

    #[error("Invalid content snapshot for {path:?}: {reason}")]
    InvalidSnapshot { path: PathBuf, reason: String },

    #[error("Tree conflict at {path:?}: {reason}")]
    TreeConflict { path: PathBuf, reason: String },

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid output specification: {0}")]
    InvalidOutputSpec(String),

    #[error("Origin metadata error: {0}")]
    OriginMetadata(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the store holds something it should not: a dangling hash,
    /// an entry of the wrong kind, or bytes that fail verification.
    pub fn is_consistency_error(&self) -> bool {
        matches!(
            self,
            CacheError::EntryNotFound(_)
                | CacheError::InvalidEntryType { .. }
                | CacheError::StorageError(StorageError::HashMismatch { .. })
                | CacheError::StorageError(StorageError::CorruptEntry { .. })
        )
    }

    /// True when the caller handed over inconsistent bookkeeping.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            CacheError::MissingOutputSnapshots(_)
                | CacheError::MissingIncomingSnapshots(_)
                | CacheError::UnexpectedSnapshotCount { .. }
                | CacheError::InvalidSnapshot { .. }
                | CacheError::TreeConflict { .. }
        )
    }
}

impl From<config::ConfigError> for CacheError {
    fn from(err: config::ConfigError) -> Self {
        CacheError::ConfigError(err.to_string())
    }
}
