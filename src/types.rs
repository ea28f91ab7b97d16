//! Core identifiers shared by the store, tree builder and commands.

use crate::error::CacheError;
use crate::tree::hasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Length in bytes of a [`ContentHash`].
pub const HASH_LEN: usize = 16;

/// 128-bit content digest identifying byte-identical content.
///
/// Two entries with equal hashes are treated as the same payload everywhere in
/// the cache; the store never keeps two different payloads under one hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; HASH_LEN]);

impl ContentHash {
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hash from its 32 character hex form.
    pub fn from_hex(s: &str) -> Result<Self, CacheError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| CacheError::InvalidHash(format!("{}: {}", s, e)))?;
        let bytes: [u8; HASH_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            CacheError::InvalidHash(format!(
                "{}: expected {} bytes, got {}",
                s,
                HASH_LEN,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Key of one cached task execution.
///
/// The key is computed by the up-to-date checking layer from the task's inputs;
/// this crate only uses it to address the top-level result entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(ContentHash);

impl CacheKey {
    pub const fn new(hash: ContentHash) -> Self {
        Self(hash)
    }

    /// Derive a key from an arbitrary label (e.g. a fingerprint string).
    pub fn derive(label: &str) -> Self {
        Self(hasher::compute_key_hash(label.as_bytes()))
    }

    pub fn hash(&self) -> &ContentHash {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.0.to_hex())
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentHash::from_hex(s).map(Self)
    }
}

/// Kind of a declared output root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    File,
    Directory,
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputType::File => f.write_str("file"),
            OutputType::Directory => f.write_str("dir"),
        }
    }
}

/// One named output of a task.
///
/// `root` is `None` when an optional output was not configured for this
/// execution; such properties are skipped by both commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPropertySpec {
    pub name: String,
    pub root: Option<PathBuf>,
    pub output_type: OutputType,
}

impl OutputPropertySpec {
    pub fn file(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: Some(root.into()),
            output_type: OutputType::File,
        }
    }

    pub fn directory(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: Some(root.into()),
            output_type: OutputType::Directory,
        }
    }

    pub fn absent(name: impl Into<String>, output_type: OutputType) -> Self {
        Self {
            name: name.into(),
            root: None,
            output_type,
        }
    }
}

/// Parses `<name>:<file|dir>:<path>`.
impl FromStr for OutputPropertySpec {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (name, kind, path) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(kind), Some(path)) if !name.is_empty() && !path.is_empty() => {
                (name, kind, path)
            }
            _ => {
                return Err(CacheError::InvalidOutputSpec(format!(
                    "{} (expected <name>:<file|dir>:<path>)",
                    s
                )))
            }
        };
        let output_type = match kind {
            "file" => OutputType::File,
            "dir" | "directory" => OutputType::Directory,
            other => {
                return Err(CacheError::InvalidOutputSpec(format!(
                    "unknown output type '{}' in {}",
                    other, s
                )))
            }
        };
        Ok(Self {
            name: name.to_string(),
            root: Some(PathBuf::from(path)),
            output_type,
        })
    }
}

/// Identity of the task that produced a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIdentity {
    /// Task path, e.g. `:app:compileJava`
    pub path: String,
    /// Task implementation type
    pub task_type: String,
}

impl TaskIdentity {
    pub fn new(path: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            task_type: task_type.into(),
        }
    }
}
