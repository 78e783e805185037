//! Index entry - a key resolved to the blob that holds its content

use crate::model::Digest;
use serde::{Deserialize, Serialize};

/// One `key => digest` record of the index
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub digest: Digest,
}

impl IndexEntry {
    pub fn new(key: impl Into<String>, digest: Digest) -> Self {
        IndexEntry {
            key: key.into(),
            digest,
        }
    }
}
