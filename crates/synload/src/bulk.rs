//! Applying the bulk-load file to the store
//!
//! Two loaders exist:
//! - [`CommandLoader`] hands the file to an external command (the site's
//!   `bcpin` wrapper), called as `<command> <table> <dir> <file>`
//! - [`PgCopyLoader`] streams the file through Postgres `COPY FROM STDIN`
//!
//! Either way the file on disk is the single source of what gets loaded.

use crate::record::{BCP_COLUMNS, BCP_DELIMITER};
use async_trait::async_trait;
use sqlx::PgPool;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tracing::{debug, info};

/// Bulk-load failures
#[derive(Error, Debug)]
pub enum BulkLoadError {
    #[error("Could not read bulk-load file: {0}")]
    Io(#[from] std::io::Error),

    /// External command could not be started or exited unsuccessfully
    #[error("Bulk-load command failed: {0}")]
    Command(String),

    #[error("COPY failed: {0}")]
    Database(#[from] sqlx::Error),

    /// The file does not match the table layout
    #[error("Malformed bulk-load file: {0}")]
    Format(String),

    /// The store refused the rows
    #[error("Rows rejected: {0}")]
    Rejected(String),
}

/// Applies a bulk-load file to a table
#[async_trait]
pub trait BulkLoader: Send + Sync {
    /// Human-readable description of the load, for the diagnostics file
    fn describe(&self, table: &str, file: &Path) -> String;

    /// Load `file` into `table`, returning the row count when known
    async fn load(&self, table: &str, file: &Path) -> Result<Option<u64>, BulkLoadError>;
}

/// Runs an external bulk-load command
#[derive(Debug, Clone)]
pub struct CommandLoader {
    program: String,
    args: Vec<String>,
}

impl CommandLoader {
    /// Build a loader from a command line such as `/opt/mgi/bin/bcpin.csh -U mgd_dbo`
    pub fn new(command: &str) -> Result<Self, BulkLoadError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| BulkLoadError::Command("empty bulk-load command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn file_args(file: &Path) -> (String, String) {
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        (dir.display().to_string(), name)
    }
}

#[async_trait]
impl BulkLoader for CommandLoader {
    fn describe(&self, table: &str, file: &Path) -> String {
        let (dir, name) = Self::file_args(file);
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.extend([table.to_string(), dir, name]);
        parts.join(" ")
    }

    async fn load(&self, table: &str, file: &Path) -> Result<Option<u64>, BulkLoadError> {
        let (dir, name) = Self::file_args(file);
        debug!(program = %self.program, table, %dir, %name, "Running bulk-load command");

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(table)
            .arg(&dir)
            .arg(&name)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| BulkLoadError::Command(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BulkLoadError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        info!(program = %self.program, table, "Bulk-load command finished");
        Ok(None)
    }
}

/// Loads the file with Postgres `COPY FROM STDIN`
#[derive(Clone)]
pub struct PgCopyLoader {
    pool: PgPool,
}

impl PgCopyLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn copy_statement(table: &str) -> String {
        // CSV so that empty columns are NULL; the quote character is one
        // that never occurs in synonym text.
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT csv, DELIMITER '{}', NULL '', QUOTE E'\\x01')",
            table,
            BCP_COLUMNS.join(", "),
            BCP_DELIMITER
        )
    }
}

#[async_trait]
impl BulkLoader for PgCopyLoader {
    fn describe(&self, table: &str, file: &Path) -> String {
        format!("{} < {}", Self::copy_statement(table), file.display())
    }

    async fn load(&self, table: &str, file: &Path) -> Result<Option<u64>, BulkLoadError> {
        let data = tokio::fs::read(file).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET LOCAL datestyle = 'ISO, MDY'")
            .execute(&mut *tx)
            .await?;

        let mut copy = tx.copy_in_raw(&Self::copy_statement(table)).await?;
        copy.send(data.as_slice()).await?;
        let rows = copy.finish().await?;

        tx.commit().await?;

        info!(table, rows, "COPY finished");
        Ok(Some(rows))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_command_loader_arguments() {
        let loader = CommandLoader::new("/opt/mgi/bin/bcpin.csh  -S dbhost").unwrap();
        let file = PathBuf::from("/data/output/MGI_Synonym.bcp");
        assert_eq!(
            loader.describe("MGI_Synonym", &file),
            "/opt/mgi/bin/bcpin.csh -S dbhost MGI_Synonym /data/output MGI_Synonym.bcp"
        );
    }

    #[test]
    fn test_command_loader_relative_file() {
        let loader = CommandLoader::new("bcpin").unwrap();
        assert_eq!(
            loader.describe("MGI_Synonym", Path::new("MGI_Synonym.bcp")),
            "bcpin MGI_Synonym . MGI_Synonym.bcp"
        );
    }

    #[test]
    fn test_empty_command_is_rejected() {
        assert!(matches!(
            CommandLoader::new("   "),
            Err(BulkLoadError::Command(_))
        ));
    }

    #[test]
    fn test_copy_statement_lists_columns() {
        let stmt = PgCopyLoader::copy_statement("MGI_Synonym");
        assert!(stmt.starts_with("COPY MGI_Synonym (_Synonym_key, _Object_key,"));
        assert!(stmt.contains("modification_date) FROM STDIN"));
        assert!(stmt.contains("DELIMITER '|'"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_loader_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("MGI_Synonym.bcp");
        std::fs::write(&file, "").unwrap();

        let ok = CommandLoader::new("true").unwrap();
        assert_eq!(ok.load("MGI_Synonym", &file).await.unwrap(), None);

        let failing = CommandLoader::new("false").unwrap();
        let err = failing.load("MGI_Synonym", &file).await.unwrap_err();
        assert!(matches!(err, BulkLoadError::Command(_)));
    }
}
