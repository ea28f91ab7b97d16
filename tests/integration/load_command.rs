//! Integration tests for the load command

use super::test_utils::{read_tree, write_tree, CacheFixture};
use outcache::command::LoadOutcome;
use outcache::error::CacheError;
use outcache::snapshot::{snapshot_outputs, to_snapshot_map, ContentSnapshot};
use outcache::store::{ManifestEntry, ResultEntry};
use outcache::tree::hasher::compute_content_hash;
use outcache::types::{CacheKey, OutputPropertySpec, OutputType};
use std::collections::BTreeMap;
use std::fs;

/// Test that loading onto an empty destination reproduces the stored tree
#[test]
fn test_round_trip_into_empty_destination() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    let files = [("a.txt", "alpha"), ("sub/b.txt", "beta"), ("sub/deeper/c.txt", "gamma")];
    write_tree(&out, &files);
    fs::create_dir_all(out.join("empty")).unwrap();
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let key = CacheKey::derive("round-trip");
    fixture.store_outputs(key, &properties);
    let expected = read_tree(&out);

    fs::remove_dir_all(&out).unwrap();
    let outcome = fixture.load_outputs(key, &properties);

    assert_eq!(read_tree(&out), expected);
    assert!(out.join("empty").is_dir());
    // root, a.txt, sub, b.txt, deeper, c.txt, empty
    assert_eq!(outcome.artifact_entry_count(), 7);
    let stats = outcome.stats().unwrap();
    assert_eq!(stats.files_copied, 3);
    assert_eq!(stats.bytes_copied, 14);
    assert_eq!(stats.files_reused, 0);

    let metadata = outcome.metadata().unwrap();
    assert_eq!(metadata.task_path, ":compile");
    assert_eq!(metadata.execution_time_ms, 42);
    assert_eq!(metadata.build_invocation_id, "integration");
}

/// Test that loading onto an identical destination performs no file I/O
#[test]
fn test_reload_onto_identical_destination_copies_nothing() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(&out, &[("a.txt", "alpha"), ("sub/b.txt", "beta")]);
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let key = CacheKey::derive("zero-copy");
    fixture.store_outputs(key, &properties);

    fs::remove_dir_all(&out).unwrap();
    let first = fixture.load_outputs(key, &properties);
    assert_eq!(first.stats().unwrap().files_copied, 2);

    let second = fixture.load_outputs(key, &properties);
    let stats = second.stats().unwrap();
    assert_eq!(stats.files_copied, 0);
    assert_eq!(stats.bytes_copied, 0);
    assert_eq!(stats.files_reused, 2);
    assert_eq!(stats.directories_created, 0);
    assert_eq!(stats.paths_deleted, 0);
    assert_eq!(second.artifact_entry_count(), 4);
}

/// Test that extra files in the destination are deleted and the rest untouched
#[test]
fn test_stale_extra_file_is_deleted() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(&out, &[("a.txt", "alpha"), ("sub/b.txt", "beta")]);
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let key = CacheKey::derive("stale");
    fixture.store_outputs(key, &properties);

    write_tree(&out, &[("extra.txt", "leftover"), ("junk/deep/x.txt", "x")]);
    let outcome = fixture.load_outputs(key, &properties);

    assert!(!out.join("extra.txt").exists());
    assert!(!out.join("junk").exists());
    assert_eq!(
        read_tree(&out),
        vec![
            ("a.txt".to_string(), "alpha".to_string()),
            ("sub/b.txt".to_string(), "beta".to_string()),
        ]
    );
    let stats = outcome.stats().unwrap();
    assert_eq!(stats.files_copied, 0);
    // extra.txt and junk; junk's children go with it
    assert_eq!(stats.paths_deleted, 2);
}

/// Test that modified files are rewritten from the cache
#[test]
fn test_modified_file_is_restored() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(&out, &[("a.txt", "alpha"), ("b.txt", "beta")]);
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let key = CacheKey::derive("modified");
    fixture.store_outputs(key, &properties);

    fs::write(out.join("a.txt"), "tampered").unwrap();
    let outcome = fixture.load_outputs(key, &properties);

    assert_eq!(fs::read_to_string(out.join("a.txt")).unwrap(), "alpha");
    let stats = outcome.stats().unwrap();
    assert_eq!(stats.files_copied, 1);
    assert_eq!(stats.files_reused, 1);
}

/// Test that a directory standing where a file belongs is replaced, and vice versa
#[test]
fn test_type_changes_are_reconciled() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(&out, &[("node", "file"), ("tree/leaf.txt", "leaf")]);
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let key = CacheKey::derive("types");
    fixture.store_outputs(key, &properties);

    fs::remove_file(out.join("node")).unwrap();
    write_tree(&out, &[("node/inner.txt", "inner")]);
    fs::remove_dir_all(out.join("tree")).unwrap();
    fs::write(out.join("tree"), "now a file").unwrap();

    fixture.load_outputs(key, &properties);
    assert_eq!(fs::read_to_string(out.join("node")).unwrap(), "file");
    assert_eq!(
        fs::read_to_string(out.join("tree").join("leaf.txt")).unwrap(),
        "leaf"
    );
}

/// Test that a cache miss leaves the filesystem alone and reports -1
#[test]
fn test_miss_leaves_outputs_alone() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(&out, &[("keep.txt", "keep")]);
    let properties = [OutputPropertySpec::directory("classes", &out)];

    let outcome = fixture.load_outputs(CacheKey::derive("never-stored"), &properties);
    assert_eq!(outcome, LoadOutcome::Miss);
    assert_eq!(outcome.artifact_entry_count(), -1);
    assert_eq!(fs::read_to_string(out.join("keep.txt")).unwrap(), "keep");
}

/// Test that an output the original execution did not produce is deleted
#[test]
fn test_output_without_recorded_hash_is_deleted() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let key = CacheKey::derive("no-output");
    fixture.store_outputs(key, &properties);

    write_tree(&out, &[("stale.txt", "stale")]);
    let outcome = fixture.load_outputs(key, &properties);

    assert!(!out.exists());
    assert_eq!(outcome.artifact_entry_count(), 0);
    assert_eq!(outcome.stats().unwrap().paths_deleted, 1);
}

/// Test that a property without a root is skipped on load
#[test]
fn test_absent_root_skipped_on_load() {
    let fixture = CacheFixture::disk();
    let jar = fixture.path("app.jar");
    fs::write(&jar, "jar").unwrap();
    let key = CacheKey::derive("absent-load");
    let properties = [
        OutputPropertySpec::absent("docs", OutputType::Directory),
        OutputPropertySpec::file("jar", &jar),
    ];
    fixture.store_outputs(key, &properties);

    fs::remove_file(&jar).unwrap();
    let outcome = fixture.load_outputs(key, &properties);
    assert_eq!(fs::read_to_string(&jar).unwrap(), "jar");
    assert!(outcome.snapshots("docs").is_none());
    assert_eq!(outcome.snapshots("jar").unwrap().len(), 1);
}

/// Test that outgoing snapshots can feed the next load directly
#[test]
fn test_outgoing_snapshots_match_filesystem() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(&out, &[("a.txt", "alpha"), ("sub/b.txt", "beta")]);
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let key = CacheKey::derive("outgoing");
    fixture.store_outputs(key, &properties);

    fs::remove_dir_all(&out).unwrap();
    let outcome = fixture.load_outputs(key, &properties);
    let outgoing = outcome.snapshots("classes").unwrap();

    let on_disk = snapshot_outputs(&properties).unwrap();
    assert_eq!(to_snapshot_map(outgoing), on_disk["classes"]);

    let root = outgoing.iter().find(|s| s.is_root).unwrap();
    assert_eq!(root.path, out);
    assert!(root.relative_path.is_empty());
    assert_eq!(root.content, ContentSnapshot::Directory);
    // children come before their directory
    assert_eq!(outgoing.last().unwrap().path, out);

    let b = outgoing.iter().find(|s| s.path == out.join("sub").join("b.txt")).unwrap();
    assert_eq!(b.relative_path.to_string(), "sub/b.txt");
    assert_eq!(b.content, ContentSnapshot::file(compute_content_hash(b"beta")));
}

/// Test that a result entry pointing at a missing tree is a consistency error
#[test]
fn test_dangling_output_hash_is_consistency_error() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    let key = CacheKey::derive("dangling");

    let mut outputs = BTreeMap::new();
    outputs.insert("classes".to_string(), compute_content_hash(b"not stored"));
    fixture
        .store()
        .put_result(
            key.hash(),
            &ResultEntry {
                outputs,
                origin_metadata: Vec::new(),
            },
        )
        .unwrap();

    let properties = vec![OutputPropertySpec::directory("classes", &out)];
    let incoming = snapshot_outputs(&properties).unwrap();
    let err = fixture
        .factory
        .create_load(key, properties, incoming)
        .load()
        .unwrap_err();
    assert!(matches!(err, CacheError::EntryNotFound(_)));
    assert!(err.is_consistency_error());
}

/// Test that a cache key resolving to a manifest is rejected
#[test]
fn test_key_resolving_to_manifest_is_rejected() {
    let fixture = CacheFixture::disk();
    let manifest = ManifestEntry::default();
    fixture
        .store()
        .put_manifest(&manifest.hash(), &manifest)
        .unwrap();

    let err = fixture
        .factory
        .create_load(CacheKey::new(manifest.hash()), Vec::new(), Default::default())
        .load()
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidEntryType { .. }));
}

/// Test the same round trip against the sled backend
#[test]
fn test_round_trip_with_sled_store() {
    let fixture = CacheFixture::sled();
    let out = fixture.path("out");
    write_tree(&out, &[("a.txt", "alpha"), ("sub/b.txt", "beta")]);
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let key = CacheKey::derive("sled");
    fixture.store_outputs(key, &properties);
    let expected = read_tree(&out);

    fs::remove_dir_all(&out).unwrap();
    fixture.load_outputs(key, &properties);
    assert_eq!(read_tree(&out), expected);
}

/// Test that a symlink at a file output is replaced and its target left alone
#[cfg(unix)]
#[test]
fn test_symlinked_file_output_is_replaced() {
    let fixture = CacheFixture::disk();
    let jar = fixture.path("build/app.jar");
    fs::create_dir_all(jar.parent().unwrap()).unwrap();
    fs::write(&jar, "cached").unwrap();
    let properties = [OutputPropertySpec::file("jar", &jar)];
    let key = CacheKey::derive("symlinked-jar");
    fixture.store_outputs(key, &properties);

    let outside = fixture.path("outside.txt");
    fs::write(&outside, "precious").unwrap();
    fs::remove_file(&jar).unwrap();
    std::os::unix::fs::symlink(&outside, &jar).unwrap();

    let outcome = fixture.load_outputs(key, &properties);
    assert!(outcome.is_hit());
    assert!(!fs::symlink_metadata(&jar).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_to_string(&jar).unwrap(), "cached");
    assert_eq!(fs::read_to_string(&outside).unwrap(), "precious");
}
