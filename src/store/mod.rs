//! Content-addressed blob store
//!
//! This module implements the storage layer: payloads are stored once per
//! distinct content, named by their BLAKE3 digest and compressed with zstd,
//! and a text index maps caller keys to digests.

mod blob;
mod file_store;
mod index;
mod shared;

pub use blob::BlobReader;
pub use file_store::{BlobStore, VerifyReport, TEMP_FILENAME};
pub use index::{validate_key, INDEX_FILENAME, SEPARATOR};
pub use shared::SharedBlobStore;
