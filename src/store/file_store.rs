//! Directory-backed blob store with a durable key index
//!
//! Layout of the working directory:
//! ```text
//! <dir>/
//!   index           key => digest, one per line
//!   TEMP            blob being written by an in-flight put
//!   <digest hex>    zstd-compressed blob, one per distinct payload
//! ```
//!
//! The in-memory index is only changed after a blob is safely renamed into
//! place. Two windows where memory runs ahead of disk remain: an index append
//! failing after a successful put, and a `remove` failing after the entry was
//! dropped from memory. Both return the error rather than papering over it.

use crate::config::StoreOptions;
use crate::error::IoResultExt;
use crate::model::{Digest, IndexEntry};
use crate::store::blob::{compress_stream, BlobReader};
use crate::store::index::{validate_key, IndexFile, INDEX_FILENAME};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the scratch file used while a put is in flight
pub const TEMP_FILENAME: &str = "TEMP";

/// A content-addressed blob store rooted at one working directory
///
/// Not synchronized: mutating operations take `&mut self`. Use
/// [`SharedBlobStore`](crate::SharedBlobStore) to share one store between
/// threads.
#[derive(Debug)]
pub struct BlobStore {
    /// Working directory
    dir: PathBuf,
    /// key → digest
    index: HashMap<String, Digest>,
    /// On-disk mirror of `index`
    index_file: IndexFile,
    options: StoreOptions,
}

/// Disagreements between the index and the blob files on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct VerifyReport {
    /// Index entries whose blob file is gone
    pub missing: Vec<IndexEntry>,
    /// Blob files no key references
    pub orphaned: Vec<Digest>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty()
    }
}

impl BlobStore {
    /// Open (or create) a store with default options
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(dir, StoreOptions::default())
    }

    /// Open (or create) a store.
    ///
    /// Fails with `Configuration` if `dir` exists but is not a directory and
    /// with `CorruptIndex` if any line of an existing index cannot be parsed.
    /// Blob files are not checked here; `get` notices missing ones.
    pub fn open_with(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let dir = dir.as_ref().to_path_buf();

        match fs::metadata(&dir) {
            Ok(meta) if !meta.is_dir() => {
                return Err(Error::Configuration(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&dir).storage(|| format!("creating {}", dir.display()))?;
                debug!(dir = %dir.display(), "created working directory");
            }
            Err(e) => return Err(Error::storage(format!("inspecting {}", dir.display()), e)),
        }

        let index_file = IndexFile::new(&dir, options.sync_writes);
        let index = index_file.load()?;

        // Nothing can be in flight yet, so any TEMP is left over from a crash
        let temp = dir.join(TEMP_FILENAME);
        if temp.exists() {
            match fs::remove_file(&temp) {
                Ok(()) => info!(path = %temp.display(), "removed stale temp file"),
                Err(e) => warn!(path = %temp.display(), error = %e, "could not remove stale temp file"),
            }
        }

        debug!(
            index = %index_file.path().display(),
            entries = index.len(),
            "opened blob store"
        );
        Ok(BlobStore {
            dir,
            index,
            index_file,
            options,
        })
    }

    /// Store the content of `source` under `key`, replacing any previous
    /// mapping for that key. Returns the content digest.
    ///
    /// The source is read once, in chunks; it is never held in memory whole.
    pub fn put<R: Read>(&mut self, key: &str, source: R) -> Result<Digest> {
        validate_key(key)?;

        let temp = self.dir.join(TEMP_FILENAME);
        let mut created = None;
        let digest = match self.write_blob(&temp, source, &mut created) {
            Ok(digest) => digest,
            Err(e) => {
                self.discard(&temp, created.as_deref());
                return Err(e);
            }
        };

        self.index.insert(key.to_string(), digest);
        self.index_file.append(key, &digest)?;
        debug!(key, digest = %digest, "put");
        Ok(digest)
    }

    /// [`put`](Self::put) for an in-memory payload
    pub fn put_bytes(&mut self, key: &str, data: &[u8]) -> Result<Digest> {
        self.put(key, data)
    }

    /// Compress `source` into the temp file, then move it into place.
    ///
    /// `created` is set to the blob path just before this call tries to
    /// create it, so a failure can tell our file from a pre-existing one.
    fn write_blob<R: Read>(
        &self,
        temp: &Path,
        source: R,
        created: &mut Option<PathBuf>,
    ) -> Result<Digest> {
        let file = File::create(temp).storage(|| format!("creating {}", temp.display()))?;
        let (digest, len) = compress_stream(source, file, &self.options)
            .storage(|| format!("compressing into {}", temp.display()))?;

        let blob = self.blob_path(&digest);
        if blob.is_file() {
            fs::remove_file(temp).storage(|| format!("deleting {}", temp.display()))?;
            debug!(digest = %digest, "content already stored");
        } else {
            *created = Some(blob.clone());
            fs::rename(temp, &blob)
                .storage(|| format!("renaming {} to {}", temp.display(), digest))?;
            debug!(digest = %digest, bytes = len, "stored new blob");
        }
        Ok(digest)
    }

    /// Best-effort cleanup after a failed put. The original error wins.
    fn discard(&self, temp: &Path, created: Option<&Path>) {
        for path in std::iter::once(temp).chain(created) {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "cleaned up after failed put"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "cleanup failed"),
            }
        }
    }

    /// Open the blob stored under `key` for reading.
    ///
    /// Returns `Ok(None)` for an unknown key. If the key is known but its blob
    /// file has disappeared, the entry is dropped from the index (memory and
    /// disk) and `Ok(None)` is returned. Other failures leave the index alone.
    pub fn get(&mut self, key: &str) -> Result<Option<BlobReader>> {
        let Some(digest) = self.index.get(key).copied() else {
            return Ok(None);
        };

        match BlobReader::open(&self.blob_path(&digest), digest) {
            Ok(reader) => Ok(Some(reader)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(key, digest = %digest, "blob file vanished; dropping index entry");
                self.index.remove(key);
                self.rewrite_index()?;
                Ok(None)
            }
            Err(e) => Err(Error::storage(format!("opening blob {digest}"), e)),
        }
    }

    /// [`get`](Self::get) and read the whole blob into memory
    pub fn get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get(key)? {
            Some(reader) => {
                let digest = reader.digest();
                let data = reader
                    .read_all()
                    .storage(|| format!("decompressing blob {digest}"))?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Remove `key`. Unknown keys are a no-op.
    ///
    /// The blob file is deleted only if no other key still references it.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        let Some(digest) = self.index.remove(key) else {
            return Ok(());
        };

        if self.index.values().any(|d| *d == digest) {
            debug!(key, digest = %digest, "blob still referenced; keeping file");
        } else {
            let blob = self.blob_path(&digest);
            match fs::remove_file(&blob) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(digest = %digest, "blob already gone")
                }
                Err(e) => return Err(Error::storage(format!("deleting blob {digest}"), e)),
            }
        }

        self.rewrite_index()?;
        debug!(key, "removed");
        Ok(())
    }

    fn rewrite_index(&self) -> Result<()> {
        self.index_file.rewrite(&self.index)
    }

    /// Compare the index with the blob files on disk. Changes nothing.
    pub fn verify(&self) -> Result<VerifyReport> {
        let context = || format!("listing {}", self.dir.display());
        let mut on_disk = BTreeSet::new();
        for entry in fs::read_dir(&self.dir).storage(context)? {
            let entry = entry.storage(context)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name == INDEX_FILENAME || name == TEMP_FILENAME {
                continue;
            }
            if let Ok(digest) = Digest::from_hex(name) {
                on_disk.insert(digest);
            }
        }

        let mut missing: Vec<IndexEntry> = self
            .index
            .iter()
            .filter(|(_, d)| !on_disk.contains(*d))
            .map(|(k, d)| IndexEntry::new(k.clone(), *d))
            .collect();
        missing.sort();

        let referenced: BTreeSet<Digest> = self.index.values().copied().collect();
        let orphaned = on_disk.difference(&referenced).copied().collect();

        Ok(VerifyReport { missing, orphaned })
    }

    /// Read-only view of the key → digest mapping
    pub fn index(&self) -> &HashMap<String, Digest> {
        &self.index
    }

    /// Index entries sorted by key
    pub fn entries(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<_> = self
            .index
            .iter()
            .map(|(k, d)| IndexEntry::new(k.clone(), *d))
            .collect();
        entries.sort();
        entries
    }

    pub fn digest_of(&self, key: &str) -> Option<Digest> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Path of the blob file for `digest` (it may not exist)
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.dir.join(digest.to_hex())
    }

    /// Working directory
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }
}
