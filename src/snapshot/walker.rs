//! Filesystem walker producing content snapshots of output roots

use crate::buffer::DEFAULT_BUFFER_SIZE;
use crate::error::CacheError;
use crate::snapshot::{ContentSnapshot, PropertySnapshots, SnapshotMap};
use crate::tree::hasher;
use crate::types::{ContentHash, OutputPropertySpec};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, instrument, trace};
use walkdir::WalkDir;

/// Snapshot every property, keyed by property name.
///
/// Properties without a root still get an (empty) entry so that a later load
/// finds incoming snapshots for them.
pub fn snapshot_outputs(
    properties: &[OutputPropertySpec],
) -> Result<PropertySnapshots, CacheError> {
    let mut out = PropertySnapshots::new();
    for property in properties {
        out.insert(property.name.clone(), snapshot_output(property)?);
    }
    Ok(out)
}

/// Snapshot a single output property
pub fn snapshot_output(property: &OutputPropertySpec) -> Result<SnapshotMap, CacheError> {
    match &property.root {
        Some(root) => snapshot_path(root),
        None => Ok(SnapshotMap::new()),
    }
}

/// Snapshot a path and, for directories, everything below it.
///
/// Symbolic links are never followed. Below the root they are not recorded;
/// a root that is itself a link is recorded as `Missing`, so a load replaces
/// the link instead of writing through it.
#[instrument(fields(root = %root.display()))]
pub fn snapshot_path(root: &Path) -> Result<SnapshotMap, CacheError> {
    let mut snapshots = SnapshotMap::new();
    let metadata = match fs::symlink_metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            snapshots.insert(root.to_path_buf(), ContentSnapshot::Missing);
            return Ok(snapshots);
        }
        Err(e) => return Err(CacheError::io(root, e)),
    };

    if metadata.file_type().is_symlink() {
        debug!("Output root is a symbolic link, recording it as missing");
        snapshots.insert(root.to_path_buf(), ContentSnapshot::Missing);
        return Ok(snapshots);
    }

    let mut buffer = vec![0u8; DEFAULT_BUFFER_SIZE];

    if metadata.is_file() {
        let hash = hash_file(root, &mut buffer)?;
        snapshots.insert(root.to_path_buf(), ContentSnapshot::file(hash));
        return Ok(snapshots);
    }

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            CacheError::io(path, io::Error::from(e))
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            snapshots.insert(entry.path().to_path_buf(), ContentSnapshot::Directory);
        } else if file_type.is_file() {
            let hash = hash_file(entry.path(), &mut buffer)?;
            snapshots.insert(entry.path().to_path_buf(), ContentSnapshot::file(hash));
        } else {
            trace!(path = %entry.path().display(), "Skipping non-regular entry");
        }
    }

    debug!(entry_count = snapshots.len(), "Snapshotted output root");
    Ok(snapshots)
}

/// Hash a file's content with the same hasher the store verifies against.
pub fn hash_file(path: &Path, buffer: &mut [u8]) -> Result<ContentHash, CacheError> {
    let mut file = fs::File::open(path).map_err(|e| CacheError::io(path, e))?;
    hasher::hash_reader(&mut file, buffer).map_err(|e| CacheError::io(path, e))
}
