//! Synonym Load Common Library
//!
//! Shared plumbing for the synonym bulk-load tools.
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Credentials**: one-line password files used by the database login
//!
//! # Example
//!
//! ```no_run
//! use synload_common::credentials::read_password_file;
//!
//! fn password() -> synload_common::Result<String> {
//!     read_password_file("/usr/local/mgi/live/dbutils/pgdbutilities/.pgpass_1line")
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod credentials;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
