//! Error types for the rotating file sink.

use std::io;
use std::path::PathBuf;

/// Result type for rotating file operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing or writing to a rotating file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The rotating file has been closed.
    #[error("rotating file is closed")]
    Closed,

    /// Invalid construction-time configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failed to create the target's parent directory.
    #[error("failed to create directory at {path}: {source}")]
    CreateDirectory {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// I/O error from the storage layer, propagated verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
