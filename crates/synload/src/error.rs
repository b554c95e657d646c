//! Error types for the synonym load
//!
//! Only run-level failures are errors. A record that fails validation is
//! not an error: it becomes a [`crate::diagnostics::Rejection`] and the run
//! carries on with the next line.

use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for load operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Fatal errors that abort a load run
#[derive(Error, Debug)]
pub enum LoadError {
    /// Processing mode is not one of load, preview, reload
    #[error("Invalid Processing Mode: '{0}'. Expected one of: load, preview, reload.")]
    InvalidMode(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required file could not be opened or written
    #[error("Could not open file {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run-scoped identifier (object type, creator, reference) is unknown
    #[error("Could not resolve {kind} '{value}'. The load cannot continue without it.")]
    UnresolvedRunValue { kind: String, value: String },

    /// An input line has too few fields and malformed lines abort the run
    #[error("Invalid Line ({line}): expected at least {expected} tab-separated fields, found {found}: {content:?}")]
    MalformedLine {
        line: usize,
        expected: usize,
        found: usize,
        content: String,
    },

    /// An input line is not valid UTF-8
    #[error("Invalid Line ({line}): not valid UTF-8")]
    Encoding { line: usize },

    /// One of the bulk lookups could not be read
    #[error("Failed to load {what} lookup: {source}")]
    Lookup {
        what: &'static str,
        #[source]
        source: StoreError,
    },

    /// Store access failed outside of the lookup phase
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The bulk-load step failed after the output file was written
    #[error("Bulk load into {table} failed: {reason}{}", reload_note(.after_reload_delete))]
    BulkLoad {
        table: String,
        reason: String,
        after_reload_delete: bool,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] synload_common::CommonError),
}

fn reload_note(after_reload_delete: &bool) -> &'static str {
    if *after_reload_delete {
        ". Existing synonyms were already deleted by the reload and have NOT been restored."
    } else {
        ""
    }
}

impl LoadError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a file error for `path`
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    /// Create an unresolved run value error
    pub fn unresolved(kind: impl std::fmt::Display, value: impl Into<String>) -> Self {
        Self::UnresolvedRunValue {
            kind: kind.to_string(),
            value: value.into(),
        }
    }

    /// Map a failed read of input line `line`
    pub fn input_read(line: usize, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::InvalidData {
            Self::Encoding { line }
        } else {
            Self::Io(source)
        }
    }

    /// Whether the store may have lost data because of this error
    pub fn is_data_loss_risk(&self) -> bool {
        matches!(
            self,
            LoadError::BulkLoad {
                after_reload_delete: true,
                ..
            }
        )
    }
}
