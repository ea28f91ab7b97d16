//! Integration tests for directory tree hashing determinism

use super::test_utils::write_tree;
use outcache::snapshot::snapshot_output;
use outcache::tree::hasher::{compute_content_hash, compute_manifest_hash};
use outcache::tree::DirectoryTreeBuilder;
use outcache::types::OutputPropertySpec;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn root_hash_of(root: &Path) -> outcache::ContentHash {
    let snapshots = snapshot_output(&OutputPropertySpec::directory("out", root)).unwrap();
    DirectoryTreeBuilder::from_snapshots(root, &snapshots)
        .unwrap()
        .root_hash()
}

/// Test that the same content in different locations hashes the same
#[test]
fn test_same_content_same_root_anywhere() {
    let temp_dir = TempDir::new().unwrap();
    let files = [("file1.txt", "content1"), ("dir1/file3.txt", "content3")];
    write_tree(&temp_dir.path().join("first"), &files);
    write_tree(&temp_dir.path().join("second/nested"), &files);

    assert_eq!(
        root_hash_of(&temp_dir.path().join("first")),
        root_hash_of(&temp_dir.path().join("second/nested"))
    );
}

/// Test that file content changes produce different root hashes
#[test]
fn test_file_content_change_different_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("out");
    write_tree(&root, &[("test.txt", "content1")]);
    let before = root_hash_of(&root);

    fs::write(root.join("test.txt"), "content2").unwrap();
    assert_ne!(before, root_hash_of(&root));
}

/// Test that renaming a file changes the root hash
#[test]
fn test_rename_different_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("out");
    write_tree(&root, &[("a.txt", "same")]);
    let before = root_hash_of(&root);

    fs::rename(root.join("a.txt"), root.join("b.txt")).unwrap();
    assert_ne!(before, root_hash_of(&root));
}

/// Test that an empty directory contributes to the root hash
#[test]
fn test_empty_directory_changes_root() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("out");
    write_tree(&root, &[("a.txt", "a")]);
    let before = root_hash_of(&root);

    fs::create_dir(root.join("empty")).unwrap();
    assert_ne!(before, root_hash_of(&root));
}

/// Test that the walked tree hashes to the hand-computed manifest
#[test]
fn test_root_matches_manifest_definition() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("out");
    write_tree(&root, &[("a.txt", "alpha"), ("sub/b.txt", "beta")]);

    let mut sub = BTreeMap::new();
    sub.insert("b.txt".to_string(), compute_content_hash(b"beta"));
    let mut top = BTreeMap::new();
    top.insert("a.txt".to_string(), compute_content_hash(b"alpha"));
    top.insert("sub".to_string(), compute_manifest_hash(&sub));

    assert_eq!(root_hash_of(&root), compute_manifest_hash(&top));
}

/// Test that a file and a directory holding the same bytes never collide
#[test]
fn test_file_and_manifest_hashes_are_distinct() {
    let empty_manifest = compute_manifest_hash(&BTreeMap::new());
    assert_ne!(empty_manifest, compute_content_hash(b""));
}
