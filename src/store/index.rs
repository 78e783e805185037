//! Index file codec
//!
//! File format, one record per line, no header:
//! ```text
//! <key> => <digest hex>\n
//! ```
//! Keys are not escaped. A later line for the same key overrides an earlier
//! one, so successive puts of one key resolve to the newest digest.

use crate::error::IoResultExt;
use crate::model::Digest;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Name of the index file inside the working directory
pub const INDEX_FILENAME: &str = "index";

/// Token between key and digest on each line
pub const SEPARATOR: &str = " => ";

/// Render one index record, including its line terminator
pub(crate) fn format_line(key: &str, digest: &Digest) -> String {
    format!("{key}{SEPARATOR}{digest}\n")
}

/// Parse one line (`line_no` is 1-based, for error reporting).
///
/// Empty lines yield `None`.
pub(crate) fn parse_line(line_no: usize, line: &str) -> Result<Option<(String, Digest)>> {
    if line.is_empty() {
        return Ok(None);
    }

    let (key, digest) = line.split_once(SEPARATOR).ok_or_else(|| Error::CorruptIndex {
        line: line_no,
        reason: format!("no {SEPARATOR:?} separator in {line:?}"),
    })?;

    let digest = Digest::from_hex(digest).map_err(|e| Error::CorruptIndex {
        line: line_no,
        reason: format!("bad digest {digest:?}: {e}"),
    })?;

    Ok(Some((key.to_string(), digest)))
}

/// Reject keys the line format cannot represent
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key is empty".into()));
    }
    if key.contains(SEPARATOR) {
        return Err(Error::InvalidKey(format!(
            "{key:?} contains the index separator {SEPARATOR:?}"
        )));
    }
    if key.contains(['\n', '\r']) {
        return Err(Error::InvalidKey(format!("{key:?} contains a line break")));
    }
    // A key ending in " =>" still fuses with the separator
    let line = format_line(key, &Digest::of(b""));
    match parse_line(1, line.trim_end_matches('\n')) {
        Ok(Some((parsed, _))) if parsed == key => Ok(()),
        _ => Err(Error::InvalidKey(format!(
            "{key:?} does not survive the index line format"
        ))),
    }
}

/// Durable mirror of the in-memory index
#[derive(Debug, Clone)]
pub(crate) struct IndexFile {
    path: PathBuf,
    sync_writes: bool,
}

impl IndexFile {
    pub(crate) fn new(dir: &Path, sync_writes: bool) -> Self {
        IndexFile {
            path: dir.join(INDEX_FILENAME),
            sync_writes,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file. A missing file is an empty index.
    pub(crate) fn load(&self) -> Result<HashMap<String, Digest>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(Error::storage(
                    format!("reading {}", self.path.display()),
                    e,
                ))
            }
        };

        let mut entries = HashMap::new();
        for (i, line) in content.lines().enumerate() {
            if let Some((key, digest)) = parse_line(i + 1, line)? {
                entries.insert(key, digest);
            }
        }
        Ok(entries)
    }

    /// Append a single record, creating the file if needed
    pub(crate) fn append(&self, key: &str, digest: &Digest) -> Result<()> {
        self.append_raw(&format_line(key, digest))
    }

    /// Replace the file with exactly `entries`.
    ///
    /// The old file is deleted first; there is a window where neither the old
    /// nor the complete new index is on disk.
    pub(crate) fn rewrite<'a, I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a String, &'a Digest)>,
    {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::storage(
                    format!("deleting {}", self.path.display()),
                    e,
                ))
            }
        }

        let mut count = 0usize;
        for (key, digest) in entries {
            self.append(key, digest)?;
            count += 1;
        }
        tracing::debug!(entries = count, "index rewritten");
        Ok(())
    }

    fn append_raw(&self, text: &str) -> Result<()> {
        let context = || format!("appending to {}", self.path.display());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .storage(context)?;
        file.write_all(text.as_bytes()).storage(context)?;
        if self.sync_writes {
            file.sync_data().storage(context)?;
        }
        Ok(())
    }
}
