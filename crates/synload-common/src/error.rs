//! Error types shared by the synonym load crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by shared plumbing
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Could not read credentials from '{path}': {reason}")]
    Credentials { path: String, reason: String },
}

impl CommonError {
    /// Create a credentials error for the given file
    pub fn credentials(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Credentials {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
