//! Thread-safe handle around a single [`BlobStore`]
//!
//! Every call takes the store's mutex for its whole duration, so puts,
//! removals and lazy recovery never interleave on the index or the temp file.

use crate::model::Digest;
use crate::store::BlobStore;
use crate::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

/// Cloneable, serialized access to one store
#[derive(Clone)]
pub struct SharedBlobStore {
    inner: Arc<Mutex<BlobStore>>,
}

impl SharedBlobStore {
    pub fn new(store: BlobStore) -> Self {
        SharedBlobStore {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn put<R: Read>(&self, key: &str, source: R) -> Result<Digest> {
        self.inner.lock().put(key, source)
    }

    /// Read the whole blob while holding the lock
    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.lock().get_bytes(key)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.inner.lock().remove(key)
    }

    /// Copy of the current index
    pub fn snapshot_index(&self) -> HashMap<String, Digest> {
        self.inner.lock().index().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Run `f` with exclusive access to the underlying store
    pub fn with<T>(&self, f: impl FnOnce(&mut BlobStore) -> T) -> T {
        f(&mut self.inner.lock())
    }
}
