//! Hash computation for blobs and manifests using BLAKE3
//!
//! Every digest is truncated to [`HASH_LEN`] bytes. Blob hashes are the plain
//! digest of the file bytes; manifest and cache key hashes are domain separated
//! so they can never be confused with the digest of some file's content.

use crate::types::{ContentHash, HASH_LEN};
use blake3::Hasher;
use std::collections::BTreeMap;
use std::io::{self, Read};

/// Incremental blob hasher
pub struct ContentHasher {
    inner: Hasher,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            inner: Hasher::new(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finalize(&self) -> ContentHash {
        truncate(&self.inner)
    }
}

/// Compute content hash for file bytes
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.update(content);
    hasher.finalize()
}

/// Stream a reader through the blob hasher using the caller's buffer.
pub fn hash_reader<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<ContentHash> {
    let mut hasher = ContentHasher::new();
    loop {
        let n = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

/// Compute the hash of a directory manifest
///
/// hash = H("manifest" || count || (name_len || name || child_hash)*)
///
/// The map iterates in name order, so the result does not depend on the order
/// in which children were discovered.
pub fn compute_manifest_hash(children: &BTreeMap<String, ContentHash>) -> ContentHash {
    let mut hasher = Hasher::new();

    // Hash type discriminator
    hasher.update(b"manifest");

    // Hash children count (8 bytes, big-endian)
    hasher.update(&(children.len() as u64).to_be_bytes());

    for (name, child) in children {
        hasher.update(&(name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update(child.as_bytes());
    }

    truncate(&hasher)
}

/// Compute the hash addressing a cache key derived from a label
pub fn compute_key_hash(label: &[u8]) -> ContentHash {
    let mut hasher = Hasher::new();
    hasher.update(b"cache-key:");
    hasher.update(label);
    truncate(&hasher)
}

fn truncate(hasher: &Hasher) -> ContentHash {
    let digest = hasher.finalize();
    let mut bytes = [0u8; HASH_LEN];
    bytes.copy_from_slice(&digest.as_bytes()[..HASH_LEN]);
    ContentHash::from_bytes(bytes)
}
