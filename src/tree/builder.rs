//! Tree builder for committing directory outputs to the content store

use crate::error::CacheError;
use crate::snapshot::{ContentSnapshot, SnapshotMap};
use crate::store::{ContentStore, ManifestEntry};
use crate::tree::hasher;
use crate::tree::path;
use crate::types::ContentHash;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, trace};

/// Pending file leaf: hash plus the path its bytes are read from on commit
#[derive(Debug)]
struct PendingFile {
    content_hash: ContentHash,
    source: PathBuf,
}

#[derive(Debug)]
enum PendingNode {
    Directory(PendingDirectory),
    File(PendingFile),
}

#[derive(Debug, Default)]
struct PendingDirectory {
    children: BTreeMap<String, PendingNode>,
}

/// Result of committing a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedTree {
    /// Hash of the root manifest
    pub root_hash: ContentHash,
    /// File leaves committed (including ones already present in the store)
    pub file_count: u64,
    /// Manifests committed, the root included
    pub manifest_count: u64,
}

/// Builder for one directory output
///
/// Paths are added relative to the output root; the root itself is implicit.
/// Nodes are kept in name-ordered maps so the commit order, and with it every
/// manifest hash, is independent of insertion order.
pub struct DirectoryTreeBuilder {
    root_path: PathBuf,
    root: PendingDirectory,
}

impl DirectoryTreeBuilder {
    /// Create an empty builder for the output rooted at `root_path`
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            root: PendingDirectory::default(),
        }
    }

    /// Build from the flat snapshot map of a directory output.
    ///
    /// The entry for the root itself is skipped. Any `Missing` entry below the
    /// root means the snapshot contradicts itself and is rejected.
    pub fn from_snapshots(root: &Path, snapshots: &SnapshotMap) -> Result<Self, CacheError> {
        let mut builder = Self::new(root);
        for (absolute_path, snapshot) in snapshots {
            if absolute_path == root {
                continue;
            }
            let components = path::relative_components(root, absolute_path)?;
            match snapshot {
                ContentSnapshot::Directory => builder.add_directory(&components)?,
                ContentSnapshot::RegularFile { content_hash } => {
                    builder.add_file(&components, *content_hash, absolute_path.clone())?
                }
                ContentSnapshot::Missing => {
                    return Err(CacheError::InvalidSnapshot {
                        path: absolute_path.clone(),
                        reason: "missing entry inside a directory output".to_string(),
                    })
                }
            }
        }
        Ok(builder)
    }

    /// Register a directory (and all of its ancestors)
    pub fn add_directory(&mut self, components: &[String]) -> Result<(), CacheError> {
        directory_at(&mut self.root, &self.root_path, components)?;
        Ok(())
    }

    /// Register a file leaf
    pub fn add_file(
        &mut self,
        components: &[String],
        content_hash: ContentHash,
        source: PathBuf,
    ) -> Result<(), CacheError> {
        let Some((name, parents)) = components.split_last() else {
            return Err(CacheError::InvalidSnapshot {
                path: source,
                reason: "file entry has no name below the output root".to_string(),
            });
        };

        let parent = directory_at(&mut self.root, &self.root_path, parents)?;
        if let Some(PendingNode::Directory(_)) = parent.children.get(name) {
            return Err(conflict(
                &self.root_path,
                components,
                "file collides with an existing directory",
            ));
        }
        trace!(name = %name, content_hash = %content_hash, "Adding file leaf");
        parent.children.insert(
            name.clone(),
            PendingNode::File(PendingFile {
                content_hash,
                source,
            }),
        );
        Ok(())
    }

    /// Hash of the tree as it would be committed, without touching a store
    pub fn root_hash(&self) -> ContentHash {
        hash_directory(&self.root)
    }

    /// Commit the tree depth first: every child is stored before the manifest
    /// that references it.
    #[instrument(skip(self, store), fields(root = %self.root_path.display()))]
    pub fn commit(&self, store: &dyn ContentStore) -> Result<CommittedTree, CacheError> {
        let start = Instant::now();
        let committed = commit_directory(&self.root, store)?;
        info!(
            root_hash = %committed.root_hash,
            file_count = committed.file_count,
            manifest_count = committed.manifest_count,
            duration_ms = start.elapsed().as_millis(),
            "Tree commit completed"
        );
        Ok(committed)
    }
}

/// Walk (creating as needed) the directory at `components`.
fn directory_at<'a>(
    root: &'a mut PendingDirectory,
    root_path: &Path,
    components: &[String],
) -> Result<&'a mut PendingDirectory, CacheError> {
    let mut dir = root;
    for (depth, name) in components.iter().enumerate() {
        let node = dir
            .children
            .entry(name.clone())
            .or_insert_with(|| PendingNode::Directory(PendingDirectory::default()));
        dir = match node {
            PendingNode::Directory(child) => child,
            PendingNode::File(_) => {
                return Err(conflict(
                    root_path,
                    &components[..=depth],
                    "directory collides with an existing file",
                ))
            }
        };
    }
    Ok(dir)
}

fn conflict(root_path: &Path, components: &[String], reason: &str) -> CacheError {
    let mut path = root_path.to_path_buf();
    path.extend(components);
    CacheError::TreeConflict {
        path,
        reason: reason.to_string(),
    }
}

fn hash_directory(dir: &PendingDirectory) -> ContentHash {
    let children = dir
        .children
        .iter()
        .map(|(name, node)| {
            let hash = match node {
                PendingNode::File(file) => file.content_hash,
                PendingNode::Directory(sub) => hash_directory(sub),
            };
            (name.clone(), hash)
        })
        .collect();
    hasher::compute_manifest_hash(&children)
}

fn commit_directory(
    dir: &PendingDirectory,
    store: &dyn ContentStore,
) -> Result<CommittedTree, CacheError> {
    let mut children = BTreeMap::new();
    let mut file_count = 0u64;
    let mut manifest_count = 0u64;

    for (name, node) in &dir.children {
        let child_hash = match node {
            PendingNode::File(file) => {
                store.put_file(&file.content_hash, &file.source)?;
                file_count += 1;
                file.content_hash
            }
            PendingNode::Directory(sub) => {
                let committed = commit_directory(sub, store)?;
                file_count += committed.file_count;
                manifest_count += committed.manifest_count;
                committed.root_hash
            }
        };
        children.insert(name.clone(), child_hash);
    }

    let manifest = ManifestEntry::new(children);
    let root_hash = manifest.hash();
    store.put_manifest(&root_hash, &manifest)?;
    debug!(hash = %root_hash, children = manifest.children().len(), "Committed manifest");

    Ok(CommittedTree {
        root_hash,
        file_count,
        manifest_count: manifest_count + 1,
    })
}
