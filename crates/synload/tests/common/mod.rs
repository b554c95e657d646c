//! Shared fixtures for the synonym load integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use synload::bulk::{BulkLoadError, BulkLoader};
use synload::config::{KeySource, LoadConfig};
use synload::record::SynonymRecord;
use synload::store::MemoryStore;
use tempfile::TempDir;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,synload=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub const MARKER: i64 = 2;
pub const JRS: i64 = 1001;
pub const DBO: i64 = 1000;

pub fn load_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

/// A small Marker world: two markers, two synonym types, two users, one
/// reference, and one synonym already stored for MGI:2 by dbo
pub fn marker_store() -> MemoryStore {
    MemoryStore::new()
        .with_mgi_type("Marker", MARKER)
        .with_mgi_type("Allele", 11)
        .with_object("MGI:12345", MARKER, 10603)
        .with_object("MGI:2", MARKER, 20000)
        .with_object("MGI:77", 11, 30000)
        .with_synonym_type(MARKER, "exact", 1004)
        .with_synonym_type(MARKER, "broad", 1005)
        .with_user("jrs", JRS)
        .with_user("dbo", DBO)
        .with_reference("J:100", 7000)
        .with_synonym(SynonymRecord {
            synonym_key: 500,
            object_key: 20000,
            mgi_type_key: MARKER,
            synonym_type_key: 1004,
            reference_key: None,
            synonym: "Known".to_string(),
            created_by_key: DBO,
            modified_by_key: DBO,
            creation_date: load_date(),
            modification_date: load_date(),
        })
}

/// Temporary load directories with an input file
pub struct Fixture {
    pub dir: TempDir,
    pub config: LoadConfig,
}

impl Fixture {
    pub fn new(mode: &str, input: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("input");
        std::fs::create_dir_all(&input_dir).unwrap();
        let input_file = input_dir.join("synonyms.txt");
        std::fs::write(&input_file, input).unwrap();

        let config = LoadConfig {
            mode: mode.to_string(),
            object_type: "Marker".to_string(),
            input_file,
            output_dir: dir.path().join("output"),
            log_dir: dir.path().join("logs"),
            created_by: "jrs".to_string(),
            key_source: KeySource::Sequence,
            ..Default::default()
        };

        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.output_path()
    }

    pub fn output(&self) -> String {
        std::fs::read_to_string(self.output_path()).unwrap()
    }

    pub fn errors(&self) -> String {
        std::fs::read_to_string(self.config.error_path()).unwrap()
    }

    pub fn diagnostics(&self) -> String {
        std::fs::read_to_string(self.config.diagnostics_path()).unwrap()
    }
}

/// Bulk loader whose load always fails
pub struct FailingLoader;

#[async_trait]
impl BulkLoader for FailingLoader {
    fn describe(&self, table: &str, file: &Path) -> String {
        format!("failing load of {} into {}", file.display(), table)
    }

    async fn load(&self, _table: &str, _file: &Path) -> Result<Option<u64>, BulkLoadError> {
        Err(BulkLoadError::Command("bcpin.csh exited with status 1".to_string()))
    }
}
