//! Rejections, warnings and the two run log files
//!
//! The error file lists every rejected or skipped record in input order,
//! one line per record. It carries no timestamps, so two runs over the
//! same input and store state produce the same error file. The
//! diagnostics file records when the run started and ended, what it ran
//! against, and every store command it issued.

use crate::error::{LoadError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Timestamp format of the diagnostics file.
pub const LOG_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Why a record was not loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Too few tab-separated fields
    MalformedLine { expected: usize, found: usize },
    UnknownObject { accession_id: String },
    DuplicateSynonym { accession_id: String, synonym: String },
    UnknownSynonymType { synonym_type: String },
    EmptySynonym,
    /// Synonym text contains the bulk-load column separator
    ReservedDelimiter { synonym: String },
    UnknownReference { jnum: String },
    UnknownUser { login: String },
}

impl RejectReason {
    /// Text of the reason as it appears in the error file
    pub fn render(&self, line: usize) -> String {
        match self {
            RejectReason::MalformedLine { expected, found } => format!(
                "Invalid Line ({}): expected {} fields, found {}",
                line, expected, found
            ),
            RejectReason::UnknownObject { accession_id } => {
                format!("Invalid Object ({}) {}", line, accession_id)
            },
            RejectReason::DuplicateSynonym {
                accession_id,
                synonym,
            } => format!(
                "Duplicate synonym ({}) {} for {}",
                line, synonym, accession_id
            ),
            RejectReason::UnknownSynonymType { synonym_type } => {
                format!("Invalid Synonym Type ({}) {}", line, synonym_type)
            },
            RejectReason::EmptySynonym => format!("Invalid Synonym:Empty ({})", line),
            RejectReason::ReservedDelimiter { synonym } => {
                format!("Invalid Synonym:Contains '|' ({}) {}", line, synonym)
            },
            RejectReason::UnknownReference { jnum } => {
                format!("Invalid Reference ({}) {}", line, jnum)
            },
            RejectReason::UnknownUser { login } => format!("Invalid User ({}) {}", line, login),
        }
    }
}

/// A record that was not loaded, with every reason found for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub line: usize,
    pub reasons: Vec<RejectReason>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.reasons.iter().map(|r| r.render(self.line)).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// A record that was skipped without counting as an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub line: usize,
    pub reason: RejectReason,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Skipped ({}): {}", self.line, self.reason.render(self.line))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Rejected(Rejection),
    Warned(Warning),
}

/// Append-only record of rejections and warnings, in input order
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Vec<Entry>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, rejection: Rejection) {
        self.entries.push(Entry::Rejected(rejection));
    }

    pub fn warn(&mut self, warning: Warning) {
        self.entries.push(Entry::Warned(warning));
    }

    pub fn rejections(&self) -> impl Iterator<Item = &Rejection> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Rejected(r) => Some(r),
            Entry::Warned(_) => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Warning> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Warned(w) => Some(w),
            Entry::Rejected(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Error-file lines, in the order the records were read
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(|e| match e {
            Entry::Rejected(r) => r.to_string(),
            Entry::Warned(w) => w.to_string(),
        })
    }
}

/// Counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub lines_read: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub warned: usize,
    pub skipped_blank: usize,
    pub first_key: Option<i64>,
    pub last_key: Option<i64>,
}

/// Descriptive header of the diagnostics file
#[derive(Debug, Clone)]
pub struct RunHeader<'a> {
    pub server: &'a str,
    pub database: &'a str,
    pub object_type: &'a str,
    pub input_file: &'a Path,
}

/// The diagnostics and error files of one run
pub struct RunLog {
    diagnostics: BufWriter<File>,
    errors: BufWriter<File>,
    diagnostics_path: PathBuf,
    error_path: PathBuf,
}

impl RunLog {
    /// Create both files, truncating earlier runs, and stamp the start time
    pub async fn open(diagnostics_path: &Path, error_path: &Path) -> Result<Self> {
        for path in [diagnostics_path, error_path] {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .await
                    .map_err(|e| LoadError::file(dir, e))?;
            }
        }

        let mut log = Self {
            diagnostics: create(diagnostics_path).await?,
            errors: create(error_path).await?,
            diagnostics_path: diagnostics_path.to_path_buf(),
            error_path: error_path.to_path_buf(),
        };
        log.diagnostic(&format!("Start Date/Time: {}", timestamp()))
            .await?;
        Ok(log)
    }

    pub fn diagnostics_path(&self) -> &Path {
        &self.diagnostics_path
    }

    pub fn error_path(&self) -> &Path {
        &self.error_path
    }

    pub async fn header(&mut self, header: &RunHeader<'_>) -> Result<()> {
        self.diagnostic(&format!("Server: {}", header.server)).await?;
        self.diagnostic(&format!("Database: {}", header.database)).await?;
        self.diagnostic(&format!("Object Type: {}", header.object_type))
            .await?;
        self.diagnostic(&format!("Input File: {}", header.input_file.display()))
            .await?;
        self.diagnostic("").await
    }

    /// Append a line to the diagnostics file
    pub async fn diagnostic(&mut self, line: &str) -> Result<()> {
        write_line(&mut self.diagnostics, line)
            .await
            .map_err(|e| LoadError::file(&self.diagnostics_path, e))
    }

    /// Append a run-level problem to the error file
    pub async fn error(&mut self, line: &str) -> Result<()> {
        write_line(&mut self.errors, line)
            .await
            .map_err(|e| LoadError::file(&self.error_path, e))
    }

    pub async fn write_error_log(&mut self, log: &ErrorLog) -> Result<()> {
        for line in log.lines() {
            self.error(&line).await?;
        }
        Ok(())
    }

    /// Stamp the end time and flush both files
    pub async fn finish(mut self) -> Result<()> {
        self.diagnostic(&format!("\nEnd Date/Time: {}", timestamp()))
            .await?;
        self.diagnostics
            .shutdown()
            .await
            .map_err(|e| LoadError::file(&self.diagnostics_path, e))?;
        self.errors
            .shutdown()
            .await
            .map_err(|e| LoadError::file(&self.error_path, e))
    }
}

async fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .await
        .map(BufWriter::new)
        .map_err(|e| LoadError::file(path, e))
}

async fn write_line(out: &mut BufWriter<File>, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await
}

fn timestamp() -> String {
    chrono::Local::now().format(LOG_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_joins_reasons() {
        let rejection = Rejection {
            line: 4,
            reasons: vec![
                RejectReason::UnknownSynonymType {
                    synonym_type: "bogus".to_string(),
                },
                RejectReason::UnknownUser {
                    login: "nobody".to_string(),
                },
            ],
        };
        assert_eq!(
            rejection.to_string(),
            "Invalid Synonym Type (4) bogus; Invalid User (4) nobody"
        );
    }

    #[test]
    fn test_error_log_keeps_input_order() {
        let mut log = ErrorLog::new();
        log.reject(Rejection {
            line: 2,
            reasons: vec![RejectReason::EmptySynonym],
        });
        log.warn(Warning {
            line: 3,
            reason: RejectReason::DuplicateSynonym {
                accession_id: "MGI:1".to_string(),
                synonym: "Foo".to_string(),
            },
        });
        log.reject(Rejection {
            line: 5,
            reasons: vec![RejectReason::UnknownObject {
                accession_id: "MGI:0".to_string(),
            }],
        });

        let lines: Vec<String> = log.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Invalid Synonym:Empty (2)".to_string(),
                "Skipped (3): Duplicate synonym (3) Foo for MGI:1".to_string(),
                "Invalid Object (5) MGI:0".to_string(),
            ]
        );
        assert_eq!(log.rejections().count(), 2);
        assert_eq!(log.warnings().count(), 1);
    }

    #[tokio::test]
    async fn test_run_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let diag = dir.path().join("logs/input.txt.diagnostics");
        let err = dir.path().join("logs/input.txt.error");

        let mut log = RunLog::open(&diag, &err).await.unwrap();
        log.header(&RunHeader {
            server: "dbhost",
            database: "mgd",
            object_type: "Marker",
            input_file: Path::new("/data/input.txt"),
        })
        .await
        .unwrap();
        log.error("Invalid Object (1) MGI:0").await.unwrap();
        log.finish().await.unwrap();

        let diagnostics = std::fs::read_to_string(&diag).unwrap();
        assert!(diagnostics.starts_with("Start Date/Time: "));
        assert!(diagnostics.contains("Server: dbhost\n"));
        assert!(diagnostics.contains("Object Type: Marker\n"));
        assert!(diagnostics.contains("End Date/Time: "));

        assert_eq!(
            std::fs::read_to_string(&err).unwrap(),
            "Invalid Object (1) MGI:0\n"
        );
    }
}
