//! Reconciliation of one stored entry against the filesystem
//!
//! Brings `target` into agreement with the entry stored under a hash, reusing
//! whatever is already on disk with the right content. Every incoming snapshot
//! visited on the way is removed from the incoming map; what remains once the
//! walk is over was not part of the cached tree.

use crate::buffer::copy_with_buffer;
use crate::error::{CacheError, StorageError};
use crate::snapshot::{ContentSnapshot, OutputSnapshot, SnapshotMap};
use crate::store::{CacheEntry, ContentStore, FileEntry, ManifestEntry};
use crate::tree::path::RelativePath;
use crate::types::ContentHash;
use std::fs;
use std::io;
use std::ops::AddAssign;
use std::path::Path;
use tracing::trace;

/// Filesystem work performed by a load
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Files written from the store
    pub files_copied: u64,
    /// Bytes written from the store
    pub bytes_copied: u64,
    /// Files left untouched because their content already matched
    pub files_reused: u64,
    pub directories_created: u64,
    /// Paths removed, counting a removed directory tree once
    pub paths_deleted: u64,
}

impl AddAssign for LoadStats {
    fn add_assign(&mut self, other: Self) {
        self.files_copied += other.files_copied;
        self.bytes_copied += other.bytes_copied;
        self.files_reused += other.files_reused;
        self.directories_created += other.directories_created;
        self.paths_deleted += other.paths_deleted;
    }
}

/// Restore the entry stored under `hash` at `target`.
///
/// `parent` is the relative path of the enclosing directory, `None` when
/// `target` is an output root. Outgoing snapshots are appended in post-order
/// (children before their directory).
pub fn reconcile(
    store: &dyn ContentStore,
    buffer: &mut [u8],
    hash: &ContentHash,
    target: &Path,
    parent: Option<&RelativePath>,
    incoming: &mut SnapshotMap,
    outgoing: &mut Vec<OutputSnapshot>,
) -> Result<LoadStats, CacheError> {
    let entry = store.get(hash)?.ok_or(CacheError::EntryNotFound(*hash))?;
    let incoming_snapshot = incoming.remove(target);
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match entry {
        CacheEntry::File(file) => {
            let (content, stats) = restore_file(&file, buffer, hash, target, incoming_snapshot)?;
            outgoing.push(OutputSnapshot {
                path: target.to_path_buf(),
                relative_path: RelativePath::for_child(parent, &name, true),
                is_root: parent.is_none(),
                content,
            });
            Ok(stats)
        }
        CacheEntry::Manifest(manifest) => {
            let relative_path = RelativePath::for_child(parent, &name, false);
            let mut stats = prepare_directory(target, incoming_snapshot)?;
            stats += restore_children(
                store,
                buffer,
                hash,
                &manifest,
                target,
                &relative_path,
                incoming,
                outgoing,
            )?;
            outgoing.push(OutputSnapshot {
                path: target.to_path_buf(),
                relative_path,
                is_root: parent.is_none(),
                content: ContentSnapshot::Directory,
            });
            Ok(stats)
        }
        CacheEntry::Result(_) => Err(CacheError::InvalidEntryType {
            hash: *hash,
            expected: "file or manifest",
            found: "result",
        }),
    }
}

fn restore_file(
    file: &FileEntry,
    buffer: &mut [u8],
    hash: &ContentHash,
    target: &Path,
    incoming: Option<ContentSnapshot>,
) -> Result<(ContentSnapshot, LoadStats), CacheError> {
    let mut stats = LoadStats::default();

    if let Some(snapshot @ ContentSnapshot::RegularFile { content_hash }) = incoming {
        if content_hash == *hash {
            trace!(path = %target.display(), "Reusing file with matching content");
            stats.files_reused += 1;
            return Ok((snapshot, stats));
        }
    }

    // Checked on disk whatever the snapshot says, so a link is never written through.
    if remove_non_file(target)? {
        stats.paths_deleted += 1;
    }

    let mut reader = file.open().map_err(|e| CacheError::io(target, e))?;
    let mut writer = fs::File::create(target).map_err(|e| CacheError::io(target, e))?;
    let copied =
        copy_with_buffer(&mut reader, &mut writer, buffer).map_err(|e| CacheError::io(target, e))?;
    trace!(path = %target.display(), bytes = copied, "Restored file from cache");

    stats.files_copied += 1;
    stats.bytes_copied += copied;
    Ok((ContentSnapshot::file(*hash), stats))
}

fn prepare_directory(
    target: &Path,
    incoming: Option<ContentSnapshot>,
) -> Result<LoadStats, CacheError> {
    let mut stats = LoadStats::default();
    if matches!(incoming, Some(ContentSnapshot::Directory)) {
        return Ok(stats);
    }
    if remove_path_if_exists(target).map_err(|e| CacheError::io(target, e))? {
        stats.paths_deleted += 1;
    }
    fs::create_dir_all(target).map_err(|e| CacheError::io(target, e))?;
    stats.directories_created += 1;
    trace!(path = %target.display(), "Created directory");
    Ok(stats)
}

#[allow(clippy::too_many_arguments)]
fn restore_children(
    store: &dyn ContentStore,
    buffer: &mut [u8],
    manifest_hash: &ContentHash,
    manifest: &ManifestEntry,
    target: &Path,
    relative_path: &RelativePath,
    incoming: &mut SnapshotMap,
    outgoing: &mut Vec<OutputSnapshot>,
) -> Result<LoadStats, CacheError> {
    let mut stats = LoadStats::default();
    for (child_name, child_hash) in manifest.children() {
        if !is_safe_child_name(child_name) {
            return Err(StorageError::CorruptEntry {
                hash: *manifest_hash,
                reason: format!("unsafe child name {:?}", child_name),
            }
            .into());
        }
        stats += reconcile(
            store,
            buffer,
            child_hash,
            &target.join(child_name),
            Some(relative_path),
            incoming,
            outgoing,
        )?;
    }
    Ok(stats)
}

/// Child names must stay inside their directory.
fn is_safe_child_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

/// Remove whatever is at `path`. Returns whether anything was removed.
pub(crate) fn remove_path_if_exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    }
    Ok(true)
}

/// Remove a directory or symlink occupying a path about to become a file.
fn remove_non_file(path: &Path) -> Result<bool, CacheError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(false),
        Ok(_) => remove_path_if_exists(path).map_err(|e| CacheError::io(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(path, e)),
    }
}
