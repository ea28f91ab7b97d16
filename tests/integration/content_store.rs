//! Integration tests for the content store backends

use outcache::config::{StorageBackend, StorageConfig};
use outcache::error::StorageError;
use outcache::store::{open_store, CacheEntry, ContentStore, DiskContentStore, ManifestEntry};
use outcache::tree::hasher::compute_content_hash;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn read_blob(store: &dyn ContentStore, hash: &outcache::ContentHash) -> Vec<u8> {
    match store.get(hash).unwrap() {
        Some(CacheEntry::File(file)) => {
            let mut bytes = Vec::new();
            file.open().unwrap().read_to_end(&mut bytes).unwrap();
            bytes
        }
        other => panic!("expected file entry, got {:?}", other),
    }
}

/// Test that a blob whose bytes do not match the declared hash is refused
#[test]
fn test_blob_hash_mismatch_rejected() {
    let temp_dir = TempDir::new().unwrap();
    for backend in [StorageBackend::Disk, StorageBackend::Sled] {
        let store = open_store(&StorageConfig {
            backend,
            path: temp_dir.path().join(format!("{:?}", backend)),
        })
        .unwrap();

        let declared = compute_content_hash(b"expected");
        let err = store.put_blob(&declared, &mut &b"actual"[..]).unwrap_err();
        assert!(matches!(err, StorageError::HashMismatch { .. }));
        assert!(!store.contains(&declared).unwrap());
    }
}

/// Test that blobs are stored verbatim and sharded by hash prefix
#[test]
fn test_disk_layout() {
    let temp_dir = TempDir::new().unwrap();
    let store = DiskContentStore::new(temp_dir.path()).unwrap();
    let hash = compute_content_hash(b"payload");
    store.put_blob(&hash, &mut &b"payload"[..]).unwrap();

    let hex = hash.to_hex();
    let path = temp_dir.path().join("blobs").join(&hex[0..2]).join(&hex);
    assert_eq!(fs::read(path).unwrap(), b"payload");
    assert_eq!(read_blob(&store, &hash), b"payload");
}

/// Test that a manifest file edited on disk is reported as corrupt
#[test]
fn test_tampered_manifest_detected() {
    let temp_dir = TempDir::new().unwrap();
    let store = DiskContentStore::new(temp_dir.path()).unwrap();

    let mut children = BTreeMap::new();
    children.insert("a.txt".to_string(), compute_content_hash(b"a"));
    let original = ManifestEntry::new(children);
    let hash = original.hash();
    store.put_manifest(&hash, &original).unwrap();

    let mut other_children = BTreeMap::new();
    other_children.insert("b.txt".to_string(), compute_content_hash(b"b"));
    let forged = ManifestEntry::new(other_children);
    let hex = hash.to_hex();
    let path = temp_dir.path().join("manifests").join(&hex[0..2]).join(&hex);
    fs::write(&path, bincode::serialize(&forged).unwrap()).unwrap();

    let err = store.get(&hash).unwrap_err();
    assert!(matches!(err, StorageError::CorruptEntry { .. }));

    fs::write(&path, b"\xff\xff garbage").unwrap();
    assert!(matches!(
        store.get(&hash).unwrap_err(),
        StorageError::CorruptEntry { .. }
    ));
}

/// Test that concurrent puts of the same content converge on one entry
#[test]
fn test_concurrent_puts_of_same_blob() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn ContentStore> = Arc::new(DiskContentStore::new(temp_dir.path()).unwrap());
    let content = vec![7u8; 256 * 1024];
    let hash = compute_content_hash(&content);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let content = content.clone();
            thread::spawn(move || store.put_blob(&hash, &mut content.as_slice()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(store.entry_count().unwrap(), 1);
    assert_eq!(read_blob(store.as_ref(), &hash), content);
}

/// Test that sled entries survive reopening the database
#[test]
fn test_sled_store_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig {
        backend: StorageBackend::Sled,
        path: temp_dir.path().join("db"),
    };
    let hash = compute_content_hash(b"durable");
    {
        let store = outcache::store::SledContentStore::new(&config.path).unwrap();
        store.put_blob(&hash, &mut &b"durable"[..]).unwrap();
        store.flush().unwrap();
    }

    let store = open_store(&config).unwrap();
    assert_eq!(read_blob(store.as_ref(), &hash), b"durable");
}
