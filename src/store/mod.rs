//! Content Store
//!
//! Flat content-addressable storage of blobs, directory manifests and task
//! results. Blobs and manifests are immutable and keyed by the hash of their
//! content, so repeated or concurrent puts of the same hash are no-ops.
//! Result entries are keyed by cache key.

pub mod disk;
pub mod persistence;

pub use disk::DiskContentStore;
pub use persistence::SledContentStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StorageError;
use crate::tree::hasher;
use crate::types::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entry resolved from the store
#[derive(Debug)]
pub enum CacheEntry {
    File(FileEntry),
    Manifest(ManifestEntry),
    Result(ResultEntry),
}

impl CacheEntry {
    /// Short name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            CacheEntry::File(_) => "file",
            CacheEntry::Manifest(_) => "manifest",
            CacheEntry::Result(_) => "result",
        }
    }
}

#[derive(Debug)]
enum BlobSource {
    OnDisk(PathBuf),
    Inline(Vec<u8>),
}

/// Stored file content
#[derive(Debug)]
pub struct FileEntry {
    source: BlobSource,
    size: u64,
}

impl FileEntry {
    pub fn on_disk(path: PathBuf, size: u64) -> Self {
        Self {
            source: BlobSource::OnDisk(path),
            size,
        }
    }

    pub fn inline(bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            source: BlobSource::Inline(bytes),
            size,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Open the blob for streaming.
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match &self.source {
            BlobSource::OnDisk(path) => Ok(Box::new(fs::File::open(path)?)),
            BlobSource::Inline(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
        }
    }
}

/// Directory manifest: child name -> child hash, in name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    children: BTreeMap<String, ContentHash>,
}

impl ManifestEntry {
    pub fn new(children: BTreeMap<String, ContentHash>) -> Self {
        Self { children }
    }

    pub fn children(&self) -> &BTreeMap<String, ContentHash> {
        &self.children
    }

    pub fn hash(&self) -> ContentHash {
        hasher::compute_manifest_hash(&self.children)
    }
}

/// Top-level record of one cached execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Output property name -> root hash. Properties that produced no output
    /// have no entry.
    pub outputs: BTreeMap<String, ContentHash>,
    /// Opaque origin metadata, see [`crate::origin`]
    pub origin_metadata: Vec<u8>,
}

/// Content Store interface
///
/// Implementations must be safe for concurrent `get`/`put` from several
/// threads, and `put_*` of a hash already present must succeed without
/// rewriting it.
pub trait ContentStore: Send + Sync {
    fn get(&self, hash: &ContentHash) -> Result<Option<CacheEntry>, StorageError>;

    fn contains(&self, hash: &ContentHash) -> Result<bool, StorageError>;

    /// Store a blob, verifying that the streamed bytes hash to `hash`.
    fn put_blob(&self, hash: &ContentHash, source: &mut dyn Read) -> Result<(), StorageError>;

    fn put_manifest(&self, hash: &ContentHash, manifest: &ManifestEntry)
        -> Result<(), StorageError>;

    /// Store (or replace) the result entry for a cache key.
    fn put_result(&self, key: &ContentHash, result: &ResultEntry) -> Result<(), StorageError>;

    /// Number of stored entries of all kinds
    fn entry_count(&self) -> Result<usize, StorageError>;

    /// Store the content of a file; skips opening it when already present.
    fn put_file(&self, hash: &ContentHash, path: &Path) -> Result<(), StorageError> {
        if self.contains(hash)? {
            return Ok(());
        }
        let mut file = fs::File::open(path).map_err(|e| {
            StorageError::IoError(io::Error::new(
                e.kind(),
                format!("Failed to open {:?} for storing: {}", path, e),
            ))
        })?;
        self.put_blob(hash, &mut file)
    }
}

/// Reject a manifest whose declared hash does not match its children.
pub(crate) fn verify_manifest(
    hash: &ContentHash,
    manifest: &ManifestEntry,
) -> Result<(), StorageError> {
    let actual = manifest.hash();
    if actual != *hash {
        return Err(StorageError::HashMismatch {
            expected: *hash,
            actual,
        });
    }
    Ok(())
}

/// Open the backend selected by configuration.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn ContentStore>, StorageError> {
    match config.backend {
        StorageBackend::Disk => Ok(Arc::new(DiskContentStore::new(&config.path)?)),
        StorageBackend::Sled => Ok(Arc::new(SledContentStore::new(&config.path)?)),
    }
}
