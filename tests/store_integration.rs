//! Store Integration Tests
//!
//! End-to-end behaviour of the public `BlobStore` API against a real
//! working directory: round trips, dedup, removal, lazy recovery, reopening.
//!
//! Run with:
//! ```bash
//! cargo test --test store_integration
//! ```

use blob_store::store::{INDEX_FILENAME, TEMP_FILENAME};
use blob_store::{BlobStore, Digest, Error, StoreOptions};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::tempdir;

/// Files in the working directory other than the index
fn blob_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|n| n != INDEX_FILENAME)
        .collect();
    names.sort();
    names
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_open_existing_index() {
    let dir = tempdir().unwrap();
    let digest = Digest::of(b"shared content");
    fs::write(
        dir.path().join(INDEX_FILENAME),
        format!("foo.txt => {digest}\nPlop da plop => {digest}\n"),
    )
    .unwrap();

    let store = BlobStore::open(dir.path()).unwrap();

    let index = store.index();
    assert_eq!(index.len(), 2);
    assert_eq!(index.get("foo.txt"), Some(&digest));
    assert_eq!(index.get("Plop da plop"), Some(&digest));
    assert!(!index.contains_key("Plop da plop!"));
}

#[test]
fn test_open_corrupt_index_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(INDEX_FILENAME), "BOO!").unwrap();

    let err = BlobStore::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex { line: 1, .. }));
}

#[test]
fn test_open_corrupt_line_after_good_ones_fails() {
    let dir = tempdir().unwrap();
    let digest = Digest::of(b"ok");
    fs::write(
        dir.path().join(INDEX_FILENAME),
        format!("good => {digest}\nbad line\n"),
    )
    .unwrap();

    let err = BlobStore::open(dir.path()).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex { line: 2, .. }));
}

#[test]
fn test_open_over_regular_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("not-a-dir");
    fs::write(&path, b"").unwrap();

    assert!(matches!(
        BlobStore::open(&path),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_open_does_not_check_blobs() {
    let dir = tempdir().unwrap();
    let digest = Digest::of(b"never stored");
    fs::write(
        dir.path().join(INDEX_FILENAME),
        format!("ghost => {digest}\n"),
    )
    .unwrap();

    let mut store = BlobStore::open(dir.path()).unwrap();
    assert_eq!(store.len(), 1);

    // The dangling entry goes away on first read
    assert!(store.get("ghost").unwrap().is_none());
    assert!(store.is_empty());
}

// ============================================================================
// Put / Get
// ============================================================================

#[test]
fn test_roundtrip_various_payloads() {
    let dir = tempdir().unwrap();
    let mut store = BlobStore::open_with(
        dir.path(),
        StoreOptions {
            buffer_size: 1024,
            ..StoreOptions::default()
        },
    )
    .unwrap();

    let large: Vec<u8> = (0..300_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let payloads: Vec<(&str, Vec<u8>)> = vec![
        ("one-byte", vec![42]),
        ("text", b"Hello world!".to_vec()),
        ("binary", (0..=255u8).collect()),
        ("large", large),
    ];

    for (key, data) in &payloads {
        let digest = store.put(key, data.as_slice()).unwrap();
        assert_eq!(digest, Digest::of(data));
    }

    for (key, data) in &payloads {
        let mut reader = store.get(key).unwrap().unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(&out, data, "payload for {key}");
    }
}

#[test]
fn test_get_unknown_key_is_absent() {
    let dir = tempdir().unwrap();
    let mut store = BlobStore::open(dir.path()).unwrap();
    assert!(store.get("never-inserted").unwrap().is_none());
    assert!(store.get_bytes("never-inserted").unwrap().is_none());
}

#[test]
fn test_dedup_example() {
    let dir = tempdir().unwrap();
    let mut store = BlobStore::open(dir.path()).unwrap();

    store.put_bytes("a.txt", b"hello").unwrap();
    store.put_bytes("b.txt", b"hello").unwrap();

    let index = store.index();
    assert_eq!(index.len(), 2);
    assert_eq!(index["a.txt"], index["b.txt"]);
    assert_eq!(blob_files(dir.path()), vec![index["a.txt"].to_hex()]);
}

#[test]
fn test_duplicate_across_reopen() {
    let dir = tempdir().unwrap();
    let digest = {
        let mut store = BlobStore::open(dir.path()).unwrap();
        store.put_bytes("sample", b"sample payload").unwrap()
    };

    let mut store = BlobStore::open(dir.path()).unwrap();
    let again = store.put_bytes("sample-bis", b"sample payload").unwrap();

    assert_eq!(again, digest);
    assert_eq!(store.len(), 2);
    assert_eq!(blob_files(dir.path()), vec![digest.to_hex()]);
    assert!(!dir.path().join(TEMP_FILENAME).exists());
}

#[test]
fn test_blob_file_is_compressed_content() {
    let dir = tempdir().unwrap();
    let mut store = BlobStore::open(dir.path()).unwrap();
    let payload = "abc".repeat(10_000);

    let digest = store.put_bytes("abc", payload.as_bytes()).unwrap();
    let on_disk = fs::read(store.blob_path(&digest)).unwrap();

    assert!(on_disk.len() < payload.len());
    assert_eq!(zstd::decode_all(on_disk.as_slice()).unwrap(), payload.as_bytes());
}

// ============================================================================
// Remove and recovery
// ============================================================================

#[test]
fn test_remove_then_get_absent() {
    let dir = tempdir().unwrap();
    let mut store = BlobStore::open(dir.path()).unwrap();

    store.put_bytes("k", b"value").unwrap();
    store.remove("k").unwrap();

    assert!(store.get("k").unwrap().is_none());
    assert!(!store.contains("k"));
    store.remove("k").unwrap();
    store.remove("never-there").unwrap();
}

#[test]
fn test_external_removal_shrinks_index() {
    let dir = tempdir().unwrap();
    let mut store = BlobStore::open(dir.path()).unwrap();

    let digest = store.put_bytes("sample", b"to be deleted").unwrap();
    store.put_bytes("survivor", b"still here").unwrap();
    assert_eq!(store.len(), 2);

    fs::remove_file(dir.path().join(digest.to_hex())).unwrap();

    assert!(store.get("sample").unwrap().is_none());
    assert_eq!(store.len(), 1);
    assert_eq!(store.get_bytes("survivor").unwrap().unwrap(), b"still here");
}

#[test]
fn test_external_removal_drops_only_the_read_key() {
    let dir = tempdir().unwrap();
    let mut store = BlobStore::open(dir.path()).unwrap();

    let digest = store.put_bytes("a", b"same").unwrap();
    store.put_bytes("b", b"same").unwrap();
    fs::remove_file(store.blob_path(&digest)).unwrap();

    assert!(store.get("a").unwrap().is_none());
    // Recovery is lazy: "b" is only dropped when it is read
    assert!(store.contains("b"));
    assert!(store.get("b").unwrap().is_none());
    assert!(store.is_empty());
}

// ============================================================================
// Durability
// ============================================================================

#[test]
fn test_reopen_reproduces_index() {
    let dir = tempdir().unwrap();
    let expected: HashMap<String, Digest> = {
        let mut store = BlobStore::open(dir.path()).unwrap();
        store.put_bytes("FOO", b"<project/>").unwrap();
        store.put_bytes("sample", b"sample").unwrap();
        store.put_bytes("dup", b"sample").unwrap();
        store.put_bytes("gone", b"temporary").unwrap();
        store.put_bytes("FOO", b"<project>v2</project>").unwrap();
        store.remove("gone").unwrap();
        store.put_bytes("late", b"after a rewrite").unwrap();
        store.index().clone()
    };

    let store = BlobStore::open(dir.path()).unwrap();
    assert_eq!(store.index(), &expected);
    assert_eq!(store.len(), 4);
}

#[test]
fn test_key_fusing_with_separator_cannot_break_reopen() {
    let dir = tempdir().unwrap();
    {
        let mut store = BlobStore::open(dir.path()).unwrap();
        store.put_bytes("kept", b"data").unwrap();

        let err = store.put_bytes("x =>", b"data").unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
        assert!(!store.contains("x =>"));

        // Keys that merely look like the separator still round-trip
        store.put_bytes("x =", b"data").unwrap();
        store.put_bytes("=> y", b"data").unwrap();
    }

    let store = BlobStore::open(dir.path()).unwrap();
    assert_eq!(store.len(), 3);
    assert!(store.contains("kept"));
    assert!(store.contains("x ="));
    assert!(store.contains("=> y"));
}

#[test]
fn test_index_file_format() {
    let dir = tempdir().unwrap();
    let mut store = BlobStore::open(dir.path()).unwrap();
    assert!(!dir.path().join(INDEX_FILENAME).exists());

    let digest = store.put_bytes("a.txt", b"hello").unwrap();

    let content = fs::read_to_string(dir.path().join(INDEX_FILENAME)).unwrap();
    assert_eq!(content, format!("a.txt => {}\n", digest.to_hex()));
}
