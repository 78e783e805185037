//! # blob_store
//!
//! A local, content-addressed blob store with a durable key index.
//!
//! Byte streams are stored under caller-chosen keys. Each distinct payload is
//! kept exactly once, compressed, in a file named by its content digest; a
//! plain-text index maps keys to digests and survives restarts.
//!
//! ## Core Concepts
//!
//! - **Digest**: BLAKE3 hash of the uncompressed payload, in hex
//! - **Blob**: zstd-compressed file named by its digest
//! - **Index**: `key => digest` lines, appended on put, rewritten on removal
//! - **Lazy recovery**: a key whose blob vanished is dropped when next read
//!
//! ## Example
//!
//! ```no_run
//! use blob_store::BlobStore;
//!
//! let mut store = BlobStore::open("/tmp/blobs")?;
//! store.put_bytes("a.txt", b"hello")?;
//! store.put_bytes("b.txt", b"hello")?; // same blob file
//! assert_eq!(store.get_bytes("a.txt")?.as_deref(), Some(&b"hello"[..]));
//! # Ok::<(), blob_store::Error>(())
//! ```

pub mod config;
pub mod model;
pub mod store;

mod error;

pub use config::{default_store_dir, StoreOptions};
pub use error::{Error, Result};
pub use model::{Digest, IndexEntry};
pub use store::{BlobReader, BlobStore, SharedBlobStore, VerifyReport};
