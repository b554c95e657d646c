//! Run configuration
//!
//! A [`LoadConfig`] describes one load run: which object type is being
//! loaded, where the input lives, where output and logs go, who the
//! synonyms are attributed to, and how lenient the record checks are.
//! It is normally built from the command line (see [`crate::Cli`]), where
//! every option can also come from the environment of the legacy wrapper
//! scripts.

use crate::error::{LoadError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;

// ============================================================================
// Load Constants
// ============================================================================

/// Target table of the bulk load.
pub const SYNONYM_TABLE: &str = "MGI_Synonym";

/// File name of the bulk-load file written to the output directory.
pub const DEFAULT_OUTPUT_FILE: &str = "MGI_Synonym.bcp";

/// Sequence that hands out synonym keys.
pub const DEFAULT_KEY_SEQUENCE: &str = "mgi_synonym_seq";

/// Reference token meaning "this synonym has no supporting publication".
pub const NO_REFERENCE_TOKEN: &str = "J:0";

/// Default database server.
pub const DEFAULT_DB_SERVER: &str = "localhost";

/// Default database name.
pub const DEFAULT_DB_NAME: &str = "mgd";

/// Default database login.
pub const DEFAULT_DB_USER: &str = "mgd_dbo";

/// Default maximum database connections. The load is sequential, the
/// second connection serves the bulk copy.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Which input columns carry the reference and creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RecordLayout {
    /// `accID, synonym, synonymType`; reference and creator come from the run
    #[default]
    RunScoped,
    /// `accID, synonym, synonymType, J:, createdBy`
    PerRecord,
}

impl RecordLayout {
    /// Minimum number of tab-separated fields a line must have
    pub fn min_fields(self) -> usize {
        match self {
            RecordLayout::RunScoped => 3,
            RecordLayout::PerRecord => 5,
        }
    }
}

/// What happens to a synonym that already exists for its object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Reject the record and report it in the error file
    #[default]
    Reject,
    /// Skip the record and report a warning
    Skip,
}

/// What happens to a line with too few fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MalformedLinePolicy {
    /// Abort the whole run
    #[default]
    Abort,
    /// Reject only the offending line
    Reject,
}

/// Which existing synonyms a reload deletes, within the object type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadScope {
    /// Synonyms created by the run's creator
    #[default]
    CreatedBy,
    /// Synonyms attached to the run's reference
    Reference,
}

/// Where the first new synonym key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum KeySource {
    /// `nextval` of the synonym key sequence
    #[default]
    Sequence,
    /// One past the largest key in the table (1000 when empty)
    MaxKey,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub server: String,
    pub database: String,
    pub user: String,
    /// File holding the password on its first line
    pub password_file: Option<PathBuf>,
    /// Full connection URL; takes precedence over the individual settings
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_DB_SERVER.to_string(),
            database: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password_file: None,
            url: None,
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl DbConfig {
    /// Apply `DB_MAX_CONNECTIONS` and `DB_CONNECT_TIMEOUT` overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(max) = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.max_connections = max;
        }
        if let Some(timeout) = std::env::var("DB_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.connect_timeout_secs = timeout;
        }
        self
    }

    /// Build Postgres connect options, reading the password file if set
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(ref url) = self.url {
            return url
                .parse()
                .map_err(|e| LoadError::config(format!("Invalid DATABASE_URL: {}", e)));
        }

        let mut options = PgConnectOptions::new()
            .host(&self.server)
            .database(&self.database)
            .username(&self.user);

        if let Some(ref path) = self.password_file {
            let password = synload_common::credentials::read_password_file(path)?;
            options = options.password(&password);
        }

        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_none() {
            if self.server.is_empty() {
                return Err(LoadError::config("Database server cannot be empty"));
            }
            if self.database.is_empty() {
                return Err(LoadError::config("Database name cannot be empty"));
            }
            if self.user.is_empty() {
                return Err(LoadError::config("Database user cannot be empty"));
            }
        }
        if self.max_connections == 0 {
            return Err(LoadError::config("DB_MAX_CONNECTIONS must be greater than 0"));
        }
        Ok(())
    }
}

/// Configuration of one load run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Processing mode as given; checked by [`crate::mode::Mode::verify`]
    pub mode: String,
    /// Object type name (`ACC_MGIType.name`), e.g. "Marker"
    pub object_type: String,
    pub input_file: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Login of the user the synonyms are created by
    pub created_by: String,
    /// Run reference (J: number); `J:0` for none
    pub jnum: String,
    pub layout: RecordLayout,
    pub duplicates: DuplicatePolicy,
    pub malformed_lines: MalformedLinePolicy,
    pub reload_scope: ReloadScope,
    pub key_source: KeySource,
    /// External bulk-load command; Postgres COPY is used when unset
    pub bcp_command: Option<String>,
    pub output_file_name: String,
    pub db: DbConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            mode: "load".to_string(),
            object_type: "Marker".to_string(),
            input_file: PathBuf::from("synonymload.txt"),
            output_dir: PathBuf::from("."),
            log_dir: PathBuf::from("."),
            created_by: String::new(),
            jnum: NO_REFERENCE_TOKEN.to_string(),
            layout: RecordLayout::default(),
            duplicates: DuplicatePolicy::default(),
            malformed_lines: MalformedLinePolicy::default(),
            reload_scope: ReloadScope::default(),
            key_source: KeySource::default(),
            bcp_command: None,
            output_file_name: DEFAULT_OUTPUT_FILE.to_string(),
            db: DbConfig::default(),
        }
    }
}

impl LoadConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.object_type.trim().is_empty() {
            return Err(LoadError::config("OBJECT_TYPE cannot be empty"));
        }
        if self.created_by.trim().is_empty() {
            return Err(LoadError::config("CREATEDBY cannot be empty"));
        }
        if self.jnum.trim().is_empty() {
            return Err(LoadError::config(format!(
                "JNUM cannot be empty (use {} for no reference)",
                NO_REFERENCE_TOKEN
            )));
        }
        if self.input_file.as_os_str().is_empty() {
            return Err(LoadError::config("INPUTFILE cannot be empty"));
        }
        if self.output_file_name.is_empty() || self.output_file_name.contains('/') {
            return Err(LoadError::config(format!(
                "Output file name must be a plain file name, got '{}'",
                self.output_file_name
            )));
        }
        self.db.validate()
    }

    fn input_stem(&self) -> String {
        self.input_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "synonymload".to_string())
    }

    /// `<logDir>/<input file name>.diagnostics`
    pub fn diagnostics_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.diagnostics", self.input_stem()))
    }

    /// `<logDir>/<input file name>.error`
    pub fn error_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.error", self.input_stem()))
    }

    /// `<outputDir>/<output file name>`
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file_name)
    }
}
