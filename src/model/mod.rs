//! Core data model types for blob_store

mod digest;
mod entry;

pub use digest::{Digest, DigestWriter, DIGEST_LEN};
pub use entry::IndexEntry;
