//! outcache: Content-Addressed Task Output Cache
//!
//! Stores the outputs of a task execution (single files and whole directory
//! trees) in a content-addressed store under a cache key, and restores them
//! later while touching as little of the filesystem as possible. Directory
//! outputs are kept as Merkle trees of manifests so identical content is stored
//! once no matter where it appears.

pub mod buffer;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod origin;
pub mod snapshot;
pub mod store;
pub mod tree;
pub mod types;

pub use command::{
    CacheCommandFactory, LoadCommand, LoadOutcome, LoadStats, StoreCommand, StoreResult,
};
pub use error::{CacheError, StorageError};
pub use types::{CacheKey, ContentHash, OutputPropertySpec, OutputType, TaskIdentity};
