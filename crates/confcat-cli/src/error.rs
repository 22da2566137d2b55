//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Catalog error.
    #[error(transparent)]
    Catalog(#[from] confcat_core::Error),

    /// Input file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying io error.
        #[source]
        source: std::io::Error,
    },

    /// Input or output JSON error.
    #[error("invalid JSON in {context}: {source}")]
    Json {
        /// Where the JSON came from.
        context: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Bad argument value.
    #[error("invalid argument: {0}")]
    Argument(String),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        use confcat_core::ErrorKind;
        match self {
            Error::Catalog(e) => match e.kind() {
                ErrorKind::Storage => 3,
                _ => 1,
            },
            _ => 2,
        }
    }
}

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;
