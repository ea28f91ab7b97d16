//! Sled-backed content store
//!
//! All entry kinds share one sled tree keyed by the raw hash bytes. Values are
//! bincode encoded [`StoredEntry`] records; blobs are kept inline.

use crate::error::StorageError;
use crate::store::{
    verify_manifest, CacheEntry, ContentStore, FileEntry, ManifestEntry, ResultEntry,
};
use crate::tree::hasher;
use crate::types::ContentHash;
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, trace};

const TREE_ENTRIES: &str = "entries";

#[derive(Debug, Serialize, Deserialize)]
enum StoredEntry {
    Blob(Vec<u8>),
    Manifest(ManifestEntry),
    Result(ResultEntry),
}

/// Sled-based implementation of ContentStore
pub struct SledContentStore {
    db: sled::Db,
    entries: sled::Tree,
}

impl SledContentStore {
    /// Create a new SledContentStore at the given path
    ///
    /// The path is used as the sled database directory.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Self::from_db(db)
    }

    /// Wrap an already opened database
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let entries = db.open_tree(TREE_ENTRIES).map_err(to_storage_io)?;
        Ok(Self { db, entries })
    }

    /// Get the underlying sled database (for advanced operations)
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_io)?;
        Ok(())
    }

    fn insert(&self, key: &ContentHash, entry: &StoredEntry) -> Result<(), StorageError> {
        let value = bincode::serialize(entry).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize entry {}: {}", key, e),
            ))
        })?;
        self.entries
            .insert(key.as_bytes(), value)
            .map_err(to_storage_io)?;
        Ok(())
    }
}

impl ContentStore for SledContentStore {
    fn get(&self, hash: &ContentHash) -> Result<Option<CacheEntry>, StorageError> {
        let Some(raw) = self.entries.get(hash.as_bytes()).map_err(to_storage_io)? else {
            return Ok(None);
        };
        let stored: StoredEntry =
            bincode::deserialize(&raw).map_err(|e| StorageError::CorruptEntry {
                hash: *hash,
                reason: format!("failed to decode entry: {}", e),
            })?;
        let entry = match stored {
            StoredEntry::Blob(bytes) => CacheEntry::File(FileEntry::inline(bytes)),
            StoredEntry::Manifest(manifest) => {
                if manifest.hash() != *hash {
                    return Err(StorageError::CorruptEntry {
                        hash: *hash,
                        reason: format!("manifest content hashes to {}", manifest.hash()),
                    });
                }
                CacheEntry::Manifest(manifest)
            }
            StoredEntry::Result(result) => CacheEntry::Result(result),
        };
        Ok(Some(entry))
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        self.entries
            .contains_key(hash.as_bytes())
            .map_err(to_storage_io)
    }

    fn put_blob(&self, hash: &ContentHash, source: &mut dyn Read) -> Result<(), StorageError> {
        if self.contains(hash)? {
            trace!(hash = %hash, "Blob already stored");
            return Ok(());
        }
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        let actual = hasher::compute_content_hash(&bytes);
        if actual != *hash {
            return Err(StorageError::HashMismatch {
                expected: *hash,
                actual,
            });
        }
        self.insert(hash, &StoredEntry::Blob(bytes))?;
        debug!(hash = %hash, "Stored blob");
        Ok(())
    }

    fn put_manifest(
        &self,
        hash: &ContentHash,
        manifest: &ManifestEntry,
    ) -> Result<(), StorageError> {
        verify_manifest(hash, manifest)?;
        if self.contains(hash)? {
            trace!(hash = %hash, "Manifest already stored");
            return Ok(());
        }
        self.insert(hash, &StoredEntry::Manifest(manifest.clone()))?;
        debug!(hash = %hash, children = manifest.children().len(), "Stored manifest");
        Ok(())
    }

    fn put_result(&self, key: &ContentHash, result: &ResultEntry) -> Result<(), StorageError> {
        self.insert(key, &StoredEntry::Result(result.clone()))?;
        debug!(key = %key, outputs = result.outputs.len(), "Stored result entry");
        Ok(())
    }

    fn entry_count(&self) -> Result<usize, StorageError> {
        Ok(self.entries.len())
    }
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}
