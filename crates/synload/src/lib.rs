//! Synonym Load Library
//!
//! Bulk loader for alternate names ("synonyms") of MGI objects.
//!
//! # Overview
//!
//! A load reads a tab-delimited file of `accession ID, synonym, synonym
//! type` records, validates each record against the database, and writes
//! every accepted record as one row of a pipe-delimited `MGI_Synonym`
//! bulk-load file. Depending on the processing mode the file is then
//! applied to the database:
//!
//! - **load**: validate, write, apply
//! - **preview**: validate and write only; the database is never changed
//! - **reload**: delete the run's earlier synonyms, then load
//!
//! Rejected records are listed in the error file next to the diagnostics
//! file; a bad record never stops the run.
//!
//! # Example
//!
//! ```no_run
//! use synload::{bulk::PgCopyLoader, config::LoadConfig, run::RunContext, store};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoadConfig {
//!         created_by: "jrs".to_string(),
//!         ..Default::default()
//!     };
//!     let pool = store::create_pool(&config.db)?;
//!     let db = store::PgSynonymStore::new(pool.clone(), "mgi_synonym_seq");
//!     let summary = RunContext::new(config)
//!         .execute(&db, &PgCopyLoader::new(pool))
//!         .await?;
//!     println!("{} synonyms accepted", summary.stats.accepted);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod bulk;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod keys;
pub mod lookup;
pub mod mode;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod resolver;
pub mod run;
pub mod store;

// Re-export commonly used types
pub use config::LoadConfig;
pub use error::{LoadError, Result};
pub use mode::Mode;
pub use run::{RunContext, RunSummary};

use clap::Parser;
use config::{
    DbConfig, DuplicatePolicy, KeySource, MalformedLinePolicy, RecordLayout, ReloadScope,
    DEFAULT_DB_NAME, DEFAULT_DB_SERVER, DEFAULT_DB_USER, DEFAULT_OUTPUT_FILE,
    NO_REFERENCE_TOKEN,
};
use std::path::PathBuf;

/// Synonym bulk-load generator
///
/// Every option can also be set through the environment variable named
/// in its help, which is how the load's wrapper scripts configure it.
#[derive(Parser, Debug)]
#[command(name = "synonymload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Processing mode: load, preview or reload
    #[arg(long, env = "LOAD_MODE", default_value = "load")]
    pub mode: String,

    /// Object type of the synonyms (ACC_MGIType name), e.g. "Marker"
    #[arg(long, env = "OBJECT_TYPE")]
    pub object_type: String,

    /// Tab-delimited input file
    #[arg(long, env = "INPUTFILE")]
    pub input_file: PathBuf,

    /// Directory of the bulk-load file
    #[arg(long, env = "OUTPUTDIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Directory of the diagnostics and error files
    #[arg(long, env = "LOGDIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Login the synonyms are created by
    #[arg(long, env = "CREATEDBY")]
    pub created_by: String,

    /// Reference of the synonyms; J:0 for none
    #[arg(long, env = "JNUM", default_value = NO_REFERENCE_TOKEN)]
    pub jnum: String,

    /// Input record layout
    #[arg(long, env = "RECORD_LAYOUT", value_enum, default_value_t = RecordLayout::RunScoped)]
    pub layout: RecordLayout,

    /// Handling of synonyms that already exist for their object
    #[arg(long, env = "DUPLICATE_POLICY", value_enum, default_value_t = DuplicatePolicy::Reject)]
    pub duplicates: DuplicatePolicy,

    /// Handling of lines with too few fields
    #[arg(long, env = "MALFORMED_LINES", value_enum, default_value_t = MalformedLinePolicy::Abort)]
    pub malformed_lines: MalformedLinePolicy,

    /// Synonyms deleted by a reload
    #[arg(long, env = "RELOAD_SCOPE", value_enum, default_value_t = ReloadScope::CreatedBy)]
    pub reload_scope: ReloadScope,

    /// Source of the first synonym key
    #[arg(long, env = "KEY_SOURCE", value_enum, default_value_t = KeySource::Sequence)]
    pub key_source: KeySource,

    /// External bulk-load command, called as `<command> <table> <dir> <file>`;
    /// Postgres COPY is used when unset
    #[arg(long, env = "BCP_COMMAND")]
    pub bcp_command: Option<String>,

    /// File name of the bulk-load file
    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file_name: String,

    /// Database server
    #[arg(long, env = "PG_DBSERVER", default_value = DEFAULT_DB_SERVER)]
    pub db_server: String,

    /// Database name
    #[arg(long, env = "PG_DBNAME", default_value = DEFAULT_DB_NAME)]
    pub db_name: String,

    /// Database login
    #[arg(long, env = "PG_DBUSER", default_value = DEFAULT_DB_USER)]
    pub db_user: String,

    /// File holding the database password on its first line
    #[arg(long, env = "PG_1LINE_PASSFILE")]
    pub password_file: Option<PathBuf>,

    /// Full connection URL; overrides server, name, user and password file
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build and validate the run configuration
    pub fn into_config(self) -> Result<LoadConfig> {
        let db = DbConfig {
            server: self.db_server,
            database: self.db_name,
            user: self.db_user,
            password_file: self.password_file,
            url: self.database_url,
            ..Default::default()
        }
        .with_env_overrides();

        let config = LoadConfig {
            mode: self.mode,
            object_type: self.object_type,
            input_file: self.input_file,
            output_dir: self.output_dir,
            log_dir: self.log_dir,
            created_by: self.created_by,
            jnum: self.jnum,
            layout: self.layout,
            duplicates: self.duplicates,
            malformed_lines: self.malformed_lines,
            reload_scope: self.reload_scope,
            key_source: self.key_source,
            bcp_command: self.bcp_command.filter(|c| !c.trim().is_empty()),
            output_file_name: self.output_file_name,
            db,
        };
        config.validate()?;
        Ok(config)
    }
}
