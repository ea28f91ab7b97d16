//! Integration tests for the store command

use super::test_utils::{write_tree, CacheFixture};
use outcache::store::CacheEntry;
use outcache::tree::hasher::compute_content_hash;
use outcache::types::{CacheKey, OutputPropertySpec, OutputType};

/// Test that a.txt and sub/b.txt are stored as a two-level manifest tree
#[test]
fn test_directory_output_manifest_layout() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(&out, &[("a.txt", "alpha"), ("sub/b.txt", "beta")]);

    let key = CacheKey::derive("layout");
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let result = fixture.store_outputs(key, &properties);
    assert_eq!(result.artifact_entry_count, 0);

    let Some(CacheEntry::Result(entry)) = fixture.store().get(key.hash()).unwrap() else {
        panic!("key should resolve to a result entry");
    };
    let root_hash = entry.outputs["classes"];
    let Some(CacheEntry::Manifest(root)) = fixture.store().get(&root_hash).unwrap() else {
        panic!("output root should be a manifest");
    };
    assert_eq!(root.children().len(), 2);
    assert_eq!(root.children()["a.txt"], compute_content_hash(b"alpha"));

    let Some(CacheEntry::Manifest(sub)) = fixture.store().get(&root.children()["sub"]).unwrap()
    else {
        panic!("sub should be a manifest");
    };
    assert_eq!(sub.children().len(), 1);
    assert_eq!(sub.children()["b.txt"], compute_content_hash(b"beta"));
}

/// Test that storing the same outputs twice adds no entries beyond the result
#[test]
fn test_store_is_idempotent() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(&out, &[("a.txt", "1"), ("b/c.txt", "2"), ("b/d.txt", "1")]);
    let properties = [OutputPropertySpec::directory("classes", &out)];

    let key = CacheKey::derive("idempotent");
    fixture.store_outputs(key, &properties);
    let count_after_first = fixture.store().entry_count().unwrap();
    let first_root = match fixture.store().get(key.hash()).unwrap() {
        Some(CacheEntry::Result(entry)) => entry.outputs["classes"],
        other => panic!("expected result entry, got {:?}", other),
    };

    fixture.store_outputs(key, &properties);
    assert_eq!(fixture.store().entry_count().unwrap(), count_after_first);
    let second_root = match fixture.store().get(key.hash()).unwrap() {
        Some(CacheEntry::Result(entry)) => entry.outputs["classes"],
        other => panic!("expected result entry, got {:?}", other),
    };
    assert_eq!(first_root, second_root);
}

/// Test that identical content is stored once however often it appears
#[test]
fn test_duplicate_content_is_deduplicated() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("out");
    write_tree(
        &out,
        &[("x/same.txt", "dup"), ("y/same.txt", "dup"), ("z.txt", "dup")],
    );
    let properties = [OutputPropertySpec::directory("classes", &out)];
    let result = fixture.store_outputs(CacheKey::derive("dedup"), &properties);

    assert_eq!(result.artifact_entry_count, 0);
    // one blob, one manifest shared by x and y, the root manifest, the result
    assert_eq!(fixture.store().entry_count().unwrap(), 4);
}

/// Test that only file properties count toward the artifact count
#[test]
fn test_only_file_outputs_are_counted() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("classes");
    write_tree(&out, &[("a.txt", "alpha"), ("sub/b.txt", "beta")]);
    let jar = fixture.path("app.jar");
    std::fs::write(&jar, "jar").unwrap();

    let key = CacheKey::derive("mixed");
    let properties = [
        OutputPropertySpec::directory("classes", &out),
        OutputPropertySpec::file("jar", &jar),
    ];
    let result = fixture.store_outputs(key, &properties);
    assert_eq!(result.artifact_entry_count, 1);

    let Some(CacheEntry::Result(entry)) = fixture.store().get(key.hash()).unwrap() else {
        panic!("expected result entry");
    };
    assert_eq!(entry.outputs.len(), 2);
}

/// Test that a property with no root is skipped and records nothing
#[test]
fn test_absent_root_records_no_output() {
    let fixture = CacheFixture::disk();
    let jar = fixture.path("app.jar");
    std::fs::write(&jar, "jar").unwrap();

    let key = CacheKey::derive("absent");
    let properties = [
        OutputPropertySpec::absent("docs", OutputType::Directory),
        OutputPropertySpec::file("jar", &jar),
    ];
    let result = fixture.store_outputs(key, &properties);
    assert_eq!(result.artifact_entry_count, 1);

    let Some(CacheEntry::Result(entry)) = fixture.store().get(key.hash()).unwrap() else {
        panic!("expected result entry");
    };
    assert!(!entry.outputs.contains_key("docs"));
    assert_eq!(entry.outputs["jar"], compute_content_hash(b"jar"));
}

/// Test that an empty directory output is stored as an empty manifest
#[test]
fn test_empty_directory_output() {
    let fixture = CacheFixture::disk();
    let out = fixture.path("empty");
    std::fs::create_dir_all(&out).unwrap();

    let key = CacheKey::derive("empty");
    let result = fixture.store_outputs(key, &[OutputPropertySpec::directory("out", &out)]);
    assert_eq!(result.artifact_entry_count, 0);

    let Some(CacheEntry::Result(entry)) = fixture.store().get(key.hash()).unwrap() else {
        panic!("expected result entry");
    };
    let Some(CacheEntry::Manifest(root)) = fixture.store().get(&entry.outputs["out"]).unwrap()
    else {
        panic!("expected manifest");
    };
    assert!(root.children().is_empty());
}

/// Test that the disk and sled backends agree on every hash
#[test]
fn test_backends_agree_on_hashes() {
    let disk = CacheFixture::disk();
    let sled = CacheFixture::sled();
    let key = CacheKey::derive("backends");

    let mut roots = Vec::new();
    for fixture in [&disk, &sled] {
        let out = fixture.path("out");
        write_tree(&out, &[("m/n.txt", "n"), ("o.txt", "o")]);
        fixture.store_outputs(key, &[OutputPropertySpec::directory("classes", &out)]);
        match fixture.store().get(key.hash()).unwrap() {
            Some(CacheEntry::Result(entry)) => roots.push(entry.outputs["classes"]),
            other => panic!("expected result entry, got {:?}", other),
        }
    }
    assert_eq!(roots[0], roots[1]);
}
