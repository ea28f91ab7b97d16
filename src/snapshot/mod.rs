//! Content snapshots
//!
//! Per-path records of what is (or should be) on disk for an output property.
//! The same type describes the incoming state before a load and the outgoing
//! state after a load or store.

pub mod walker;

pub use walker::{snapshot_output, snapshot_outputs};

use crate::tree::path::RelativePath;
use crate::types::ContentHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Content state of a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentSnapshot {
    RegularFile { content_hash: ContentHash },
    Directory,
    Missing,
}

impl ContentSnapshot {
    pub fn file(content_hash: ContentHash) -> Self {
        ContentSnapshot::RegularFile { content_hash }
    }

    pub fn content_hash(&self) -> Option<ContentHash> {
        match self {
            ContentSnapshot::RegularFile { content_hash } => Some(*content_hash),
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ContentSnapshot::RegularFile { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, ContentSnapshot::Directory)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ContentSnapshot::Missing)
    }
}

/// Absolute path -> snapshot, for one output property
pub type SnapshotMap = BTreeMap<PathBuf, ContentSnapshot>;

/// Property name -> snapshots of that property
pub type PropertySnapshots = BTreeMap<String, SnapshotMap>;

/// Outgoing snapshot produced while restoring an output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSnapshot {
    pub path: PathBuf,
    pub relative_path: RelativePath,
    pub is_root: bool,
    pub content: ContentSnapshot,
}

/// Flatten outgoing snapshots back into a [`SnapshotMap`], e.g. to feed the
/// next load as its incoming state.
pub fn to_snapshot_map(snapshots: &[OutputSnapshot]) -> SnapshotMap {
    snapshots
        .iter()
        .map(|s| (s.path.clone(), s.content))
        .collect()
}
