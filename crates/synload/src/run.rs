//! Orchestration of one load run
//!
//! [`RunContext::execute`] drives the phases in a fixed order:
//!
//! 1. open the diagnostics and error files
//! 2. verify the processing mode
//! 3. resolve the run's object type, creator and reference
//! 4. reload only: delete the run's existing synonyms
//! 5. seed the key allocator
//! 6. load the lookup tables
//! 7. validate every input line and write the bulk-load file
//! 8. load and reload only: apply the file, then resync the key sequence
//!
//! Both log files are closed with an end timestamp whatever the outcome.

use crate::bulk::BulkLoader;
use crate::config::{KeySource, LoadConfig, ReloadScope, DEFAULT_KEY_SEQUENCE, SYNONYM_TABLE};
use crate::diagnostics::{RunHeader, RunLog, RunStats};
use crate::error::{LoadError, Result};
use crate::keys::KeyAllocator;
use crate::lookup::LookupCache;
use crate::mode::Mode;
use crate::pipeline::{PipelineSettings, RecordPipeline};
use crate::resolver::{IdentifierKind, Resolution, Resolver};
use crate::store::{DeleteScope, Key, SynonymStore};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::{error, info};

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub object_type: String,
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub diagnostics_file: PathBuf,
    pub error_file: PathBuf,
    /// Rows removed by the reload delete
    pub deleted: Option<u64>,
    /// Rows reported by the bulk loader, when it reports them
    pub loaded: Option<u64>,
    pub committed: bool,
    #[serde(flatten)]
    pub stats: RunStats,
}

/// Run-scoped keys resolved before any record is read
#[derive(Debug, Clone, Copy)]
struct RunKeys {
    mgi_type_key: Key,
    creator_key: Key,
    reference: Resolution,
}

pub struct RunContext {
    config: LoadConfig,
    load_date: NaiveDate,
    show_progress: bool,
}

impl RunContext {
    pub fn new(config: LoadConfig) -> Self {
        Self {
            config,
            load_date: chrono::Local::now().date_naive(),
            show_progress: false,
        }
    }

    /// Date stamped on every emitted row; defaults to today
    pub fn with_load_date(mut self, load_date: NaiveDate) -> Self {
        self.load_date = load_date;
        self
    }

    /// Show a console spinner while records are processed
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    pub async fn execute(
        &self,
        store: &dyn SynonymStore,
        loader: &dyn BulkLoader,
    ) -> Result<RunSummary> {
        info!(input = %self.config.input_file.display(), "Initializing");
        let mut log =
            RunLog::open(&self.config.diagnostics_path(), &self.config.error_path()).await?;

        let result = self.run_phases(store, loader, &mut log).await;

        if let Err(ref e) = result {
            error!(error = %e, "Synonym load failed");
            let message = format!("Fatal: {}", e);
            // The run error is what gets reported; these writes are best effort.
            let _ = log.diagnostic(&message).await;
            let _ = log.error(&message).await;
        }

        let finished = log.finish().await;
        let summary = result?;
        finished?;
        Ok(summary)
    }

    async fn run_phases(
        &self,
        store: &dyn SynonymStore,
        loader: &dyn BulkLoader,
        log: &mut RunLog,
    ) -> Result<RunSummary> {
        let config = &self.config;

        info!(mode = %config.mode, "Verifying load mode");
        let mode = Mode::verify(&config.mode)?;

        log.header(&RunHeader {
            server: &config.db.server,
            database: &config.db.database,
            object_type: &config.object_type,
            input_file: &config.input_file,
        })
        .await?;

        let keys = self.resolve_run_keys(store).await?;

        let deleted = if mode.deletes_first() {
            Some(self.reload_delete(store, &keys, log).await?)
        } else {
            None
        };

        let allocator = KeyAllocator::seed(store, config.key_source, mode.commits()).await?;
        info!(first_key = allocator.peek(), source = ?config.key_source, "Key allocator seeded");

        info!("Creating lookups");
        let lookups = LookupCache::load(store, keys.mgi_type_key).await?;

        info!("Processing input file");
        let stats = self.process_input(store, &lookups, allocator, &keys, log).await?;
        info!(
            lines = stats.lines_read,
            accepted = stats.accepted,
            rejected = stats.rejected,
            skipped = stats.warned,
            "Input file processed"
        );

        let output_file = config.output_path();
        let mut loaded = None;
        if mode.commits() {
            loaded = self.commit(store, loader, mode, log).await?;
        } else {
            info!(%mode, "Skipping bulk load");
            log.diagnostic(&format!("Skipping bulk load. Mode: {}", mode))
                .await?;
        }

        Ok(RunSummary {
            mode,
            object_type: config.object_type.clone(),
            input_file: config.input_file.clone(),
            output_file,
            diagnostics_file: log.diagnostics_path().to_path_buf(),
            error_file: log.error_path().to_path_buf(),
            deleted,
            loaded,
            committed: mode.commits(),
            stats,
        })
    }

    async fn resolve_run_keys(&self, store: &dyn SynonymStore) -> Result<RunKeys> {
        let config = &self.config;

        let mgi_type_key = Resolver::object_type(store, &config.object_type)
            .await?
            .key()
            .ok_or_else(|| LoadError::unresolved(IdentifierKind::ObjectType, &config.object_type))?;

        let mut resolver = Resolver::new(store, mgi_type_key);

        let creator = resolver.resolve(IdentifierKind::User, &config.created_by).await?;
        let reference = resolver.resolve(IdentifierKind::Reference, &config.jnum).await?;

        let creator_key = creator
            .key()
            .ok_or_else(|| LoadError::unresolved(IdentifierKind::User, &config.created_by))?;
        if !reference.is_resolved() {
            return Err(LoadError::unresolved(IdentifierKind::Reference, &config.jnum));
        }

        info!(mgi_type_key, creator_key, reference = ?reference, "Run values resolved");
        Ok(RunKeys {
            mgi_type_key,
            creator_key,
            reference,
        })
    }

    async fn reload_delete(
        &self,
        store: &dyn SynonymStore,
        keys: &RunKeys,
        log: &mut RunLog,
    ) -> Result<u64> {
        let scope = match self.config.reload_scope {
            ReloadScope::CreatedBy => DeleteScope::CreatedBy {
                mgi_type_key: keys.mgi_type_key,
                user_key: keys.creator_key,
            },
            ReloadScope::Reference => DeleteScope::Reference {
                mgi_type_key: keys.mgi_type_key,
                reference_key: keys.reference.key(),
            },
        };

        log.diagnostic(&scope.describe(SYNONYM_TABLE)).await?;
        let deleted = store.delete_scoped(&scope).await?;
        info!(deleted, scope = ?scope, "Deleted existing synonyms for reload");
        Ok(deleted)
    }

    async fn process_input(
        &self,
        store: &dyn SynonymStore,
        lookups: &LookupCache,
        allocator: KeyAllocator,
        keys: &RunKeys,
        log: &mut RunLog,
    ) -> Result<RunStats> {
        let config = &self.config;

        let input = tokio::fs::File::open(&config.input_file)
            .await
            .map_err(|e| LoadError::file(&config.input_file, e))?;

        let output_path = config.output_path();
        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|e| LoadError::file(&config.output_dir, e))?;
        let output = tokio::fs::File::create(&output_path)
            .await
            .map_err(|e| LoadError::file(&output_path, e))?;
        let mut output = BufWriter::new(output);

        let settings = PipelineSettings {
            layout: config.layout,
            duplicates: config.duplicates,
            malformed_lines: config.malformed_lines,
            load_date: self.load_date,
            mgi_type_key: keys.mgi_type_key,
            run_reference: keys.reference,
            run_creator_key: keys.creator_key,
        };

        let progress = if self.show_progress {
            crate::progress::create_spinner("Processing input file")
        } else {
            crate::progress::hidden()
        };

        let mut pipeline =
            RecordPipeline::new(settings, store, lookups, allocator).with_progress(progress);
        let outcome = pipeline.run(BufReader::new(input), &mut output).await;
        let report = pipeline.finish();

        // Rejections found before an abort are still reported.
        log.write_error_log(&report.errors).await?;
        outcome?;
        output.shutdown().await?;

        Ok(report.stats)
    }

    async fn commit(
        &self,
        store: &dyn SynonymStore,
        loader: &dyn BulkLoader,
        mode: Mode,
        log: &mut RunLog,
    ) -> Result<Option<u64>> {
        let output_path = self.config.output_path();

        info!(table = SYNONYM_TABLE, file = %output_path.display(), "Executing bulk load");
        log.diagnostic(&loader.describe(SYNONYM_TABLE, &output_path))
            .await?;

        let loaded = loader
            .load(SYNONYM_TABLE, &output_path)
            .await
            .map_err(|e| {
                let err = LoadError::BulkLoad {
                    table: SYNONYM_TABLE.to_string(),
                    reason: e.to_string(),
                    after_reload_delete: mode.deletes_first(),
                };
                if err.is_data_loss_risk() {
                    error!(
                        table = SYNONYM_TABLE,
                        "Bulk load failed after the reload delete; deleted synonyms are NOT restored"
                    );
                }
                err
            })?;
        info!(rows = ?loaded, "Bulk load finished");

        if self.config.key_source == KeySource::Sequence {
            log.diagnostic(&format!(
                "select setval('{}', (select max(_Synonym_key) from {}))",
                DEFAULT_KEY_SEQUENCE, SYNONYM_TABLE
            ))
            .await?;
            store.sync_key_sequence().await?;
            info!("Key sequence synchronized");
        }

        Ok(loaded)
    }
}
