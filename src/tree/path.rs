//! Path bookkeeping relative to an output root

use crate::error::{CacheError, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Location of an entry below its output root.
///
/// A directory root has the empty path. A file root is recorded by its own name,
/// and nested entries append their name to the parent's segments. The value
/// does not depend on where the root lives on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelativePath {
    segments: Vec<String>,
}

impl RelativePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Path of a child entry; `parent == None` means the child is the root itself.
    pub fn for_child(parent: Option<&RelativePath>, name: &str, is_file: bool) -> Self {
        match parent {
            Some(parent) => parent.join(name),
            None if is_file => Self::from_segments(vec![name.to_string()]),
            None => Self::root(),
        }
    }

    pub fn join(&self, name: &str) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(name.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Split `path` into UTF-8 name components below `root`.
pub fn relative_components(root: &Path, path: &Path) -> Result<Vec<String>, CacheError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| CacheError::InvalidSnapshot {
            path: path.to_path_buf(),
            reason: format!("not located under output root {:?}", root),
        })?;

    relative
        .components()
        .map(|component| match component {
            Component::Normal(name) => {
                name.to_str()
                    .map(str::to_string)
                    .ok_or_else(|| CacheError::InvalidSnapshot {
                        path: path.to_path_buf(),
                        reason: "file name is not valid UTF-8".to_string(),
                    })
            }
            other => Err(CacheError::InvalidSnapshot {
                path: path.to_path_buf(),
                reason: format!("unexpected path component {:?}", other),
            }),
        })
        .collect()
}

/// Resolve an output root to an absolute path.
///
/// The root itself may not exist yet (first load into a clean checkout), so
/// only the deepest existing ancestor is canonicalized.
pub fn absolute_root(path: &Path) -> Result<PathBuf, StorageError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut suffix = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                suffix.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }

    let mut resolved = dunce::canonicalize(existing).map_err(|e| {
        StorageError::InvalidPath(format!("Failed to canonicalize {:?}: {}", existing, e))
    })?;
    for name in suffix.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}
