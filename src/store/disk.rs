//! Filesystem-backed content store
//!
//! Entries live at paths derived from their hash:
//! `{root}/{kind}/{hex[0..2]}/{hex}` where `kind` is `blobs`, `manifests` or
//! `results`. Blobs are stored verbatim so loads stream them straight from
//! disk; manifests and results are bincode encoded.
//!
//! Writes go to a temporary file in the destination directory and are renamed
//! into place, so readers never observe a partially written entry and two
//! writers of the same hash converge on identical bytes.

use crate::buffer::DEFAULT_BUFFER_SIZE;
use crate::error::StorageError;
use crate::store::{
    verify_manifest, CacheEntry, ContentStore, FileEntry, ManifestEntry, ResultEntry,
};
use crate::tree::hasher::ContentHasher;
use crate::types::ContentHash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};
use walkdir::WalkDir;

const BLOBS_DIR: &str = "blobs";
const MANIFESTS_DIR: &str = "manifests";
const RESULTS_DIR: &str = "results";

/// Content store rooted at a directory
pub struct DiskContentStore {
    root: PathBuf,
}

impl DiskContentStore {
    /// Create a new DiskContentStore at the given root path
    ///
    /// The kind directories are created as needed.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        for kind in [BLOBS_DIR, MANIFESTS_DIR, RESULTS_DIR] {
            let dir = root.join(kind);
            fs::create_dir_all(&dir).map_err(|e| {
                StorageError::IoError(io::Error::new(
                    e.kind(),
                    format!("Failed to create store directory at {:?}: {}", dir, e),
                ))
            })?;
        }
        Ok(Self { root })
    }

    /// Get the root path of this storage
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the filesystem path for an entry of the given kind
    ///
    /// The first byte of the hash picks a shard directory to keep directory
    /// sizes bounded.
    fn entry_path(&self, kind: &str, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.root.join(kind).join(&hex[0..2]).join(hex)
    }

    fn read_encoded<T: DeserializeOwned>(
        &self,
        path: &Path,
        hash: &ContentHash,
    ) -> Result<T, StorageError> {
        let bytes = fs::read(path)?;
        bincode::deserialize(&bytes).map_err(|e| StorageError::CorruptEntry {
            hash: *hash,
            reason: format!("failed to decode {:?}: {}", path, e),
        })
    }

    fn write_encoded<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let bytes = bincode::serialize(value).map_err(|e| {
            StorageError::IoError(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to serialize entry for {:?}: {}", path, e),
            ))
        })?;
        let mut temp = self.temp_file_for(path)?;
        temp.write_all(&bytes)?;
        persist(temp, path)
    }

    fn temp_file_for(&self, path: &Path) -> Result<NamedTempFile, StorageError> {
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| {
            StorageError::IoError(io::Error::new(
                e.kind(),
                format!("Failed to create parent directory {:?}: {}", parent, e),
            ))
        })?;
        Ok(NamedTempFile::new_in(parent)?)
    }
}

fn persist(temp: NamedTempFile, path: &Path) -> Result<(), StorageError> {
    temp.persist(path).map_err(|e| {
        StorageError::IoError(io::Error::new(
            e.error.kind(),
            format!("Failed to move entry into place at {:?}: {}", path, e.error),
        ))
    })?;
    Ok(())
}

fn is_entry_name(name: &str) -> bool {
    name.len() == 2 * crate::types::HASH_LEN && name.bytes().all(|b| b.is_ascii_hexdigit())
}

impl ContentStore for DiskContentStore {
    fn get(&self, hash: &ContentHash) -> Result<Option<CacheEntry>, StorageError> {
        let blob_path = self.entry_path(BLOBS_DIR, hash);
        match fs::metadata(&blob_path) {
            Ok(metadata) => {
                return Ok(Some(CacheEntry::File(FileEntry::on_disk(
                    blob_path,
                    metadata.len(),
                ))))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let manifest_path = self.entry_path(MANIFESTS_DIR, hash);
        if manifest_path.exists() {
            let manifest: ManifestEntry = self.read_encoded(&manifest_path, hash)?;
            if manifest.hash() != *hash {
                return Err(StorageError::CorruptEntry {
                    hash: *hash,
                    reason: format!("manifest content hashes to {}", manifest.hash()),
                });
            }
            return Ok(Some(CacheEntry::Manifest(manifest)));
        }

        let result_path = self.entry_path(RESULTS_DIR, hash);
        if result_path.exists() {
            let result: ResultEntry = self.read_encoded(&result_path, hash)?;
            return Ok(Some(CacheEntry::Result(result)));
        }

        Ok(None)
    }

    fn contains(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        Ok([BLOBS_DIR, MANIFESTS_DIR, RESULTS_DIR]
            .iter()
            .any(|kind| self.entry_path(kind, hash).exists()))
    }

    fn put_blob(&self, hash: &ContentHash, source: &mut dyn Read) -> Result<(), StorageError> {
        let path = self.entry_path(BLOBS_DIR, hash);
        if path.exists() {
            trace!(hash = %hash, "Blob already stored");
            return Ok(());
        }

        let mut temp = self.temp_file_for(&path)?;
        let mut hasher = ContentHasher::new();
        let mut buffer = vec![0u8; DEFAULT_BUFFER_SIZE];
        loop {
            let n = match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            hasher.update(&buffer[..n]);
            temp.write_all(&buffer[..n])?;
        }

        let actual = hasher.finalize();
        if actual != *hash {
            return Err(StorageError::HashMismatch {
                expected: *hash,
                actual,
            });
        }

        persist(temp, &path)?;
        debug!(hash = %hash, "Stored blob");
        Ok(())
    }

    fn put_manifest(
        &self,
        hash: &ContentHash,
        manifest: &ManifestEntry,
    ) -> Result<(), StorageError> {
        verify_manifest(hash, manifest)?;
        let path = self.entry_path(MANIFESTS_DIR, hash);
        if path.exists() {
            trace!(hash = %hash, "Manifest already stored");
            return Ok(());
        }
        self.write_encoded(&path, manifest)?;
        debug!(hash = %hash, children = manifest.children().len(), "Stored manifest");
        Ok(())
    }

    fn put_result(&self, key: &ContentHash, result: &ResultEntry) -> Result<(), StorageError> {
        let path = self.entry_path(RESULTS_DIR, key);
        self.write_encoded(&path, result)?;
        debug!(key = %key, outputs = result.outputs.len(), "Stored result entry");
        Ok(())
    }

    fn entry_count(&self) -> Result<usize, StorageError> {
        let mut count = 0usize;
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| StorageError::IoError(io::Error::from(e)))?;
            if entry.file_type().is_file()
                && entry.file_name().to_str().map_or(false, is_entry_name)
            {
                count += 1;
            }
        }
        Ok(count)
    }
}
