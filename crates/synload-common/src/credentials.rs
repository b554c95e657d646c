//! Credential file handling
//!
//! Database passwords are handed to the loaders as a path to a file holding
//! the password on its first line, so the secret never appears in the
//! environment or on the command line.

use crate::error::{CommonError, Result};
use std::path::Path;

/// Read the password stored on the first line of `path`.
///
/// Surrounding whitespace (including the trailing newline) is stripped.
/// An empty first line is an error.
pub fn read_password_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| CommonError::credentials(path.display().to_string(), e.to_string()))?;

    let password = content.lines().next().map(str::trim).unwrap_or_default();
    if password.is_empty() {
        return Err(CommonError::credentials(
            path.display().to_string(),
            "password file is empty",
        ));
    }

    Ok(password.to_string())
}
