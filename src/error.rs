//! Error types for blob_store

use thiserror::Error;

/// Result type alias for blob_store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blob_store operations
#[derive(Error, Debug)]
pub enum Error {
    /// The working directory path cannot be used (or the options are invalid)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A line of the index file could not be parsed
    #[error("Corrupt index at line {line}: {reason}")]
    CorruptIndex { line: usize, reason: String },

    /// Any underlying filesystem or codec failure
    #[error("Storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl Error {
    pub(crate) fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Storage {
            context: context.into(),
            source,
        }
    }

    /// Whether this error wraps an I/O failure
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage { .. })
    }
}

/// Attach context to raw I/O results
pub(crate) trait IoResultExt<T> {
    fn storage(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn storage(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| Error::storage(context(), e))
    }
}
