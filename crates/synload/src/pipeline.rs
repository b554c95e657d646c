//! Per-record validation and emission
//!
//! Every input line goes through the same checks, in order:
//!
//! 1. parse into fields (too few fields aborts the run, or rejects the
//!    line, depending on [`MalformedLinePolicy`])
//! 2. empty synonym text, noted but not yet final
//! 3. object accession ID; not found rejects at once
//! 4. duplicate of a synonym already stored for the object; rejects or
//!    skips at once, depending on [`DuplicatePolicy`]
//! 5. synonym type, reserved delimiter, reference, creator; all failures
//!    are collected into a single rejection
//!
//! A record that passes gets the next key and is written to the
//! bulk-load file. Store failures are the only errors that escape.

use crate::config::{DuplicatePolicy, MalformedLinePolicy, RecordLayout};
use crate::diagnostics::{ErrorLog, RejectReason, Rejection, RunStats, Warning};
use crate::error::{LoadError, Result};
use crate::keys::KeyAllocator;
use crate::lookup::LookupCache;
use crate::record::{InputRecord, SynonymRecord, BCP_DELIMITER, INPUT_DELIMITER};
use crate::resolver::{IdentifierKind, Resolution, Resolver};
use crate::store::{Key, SynonymStore};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Values fixed for the whole run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub layout: RecordLayout,
    pub duplicates: DuplicatePolicy,
    pub malformed_lines: MalformedLinePolicy,
    /// Creation and modification date of every emitted row
    pub load_date: NaiveDate,
    pub mgi_type_key: Key,
    /// Reference used when a record does not name its own
    pub run_reference: Resolution,
    /// Creator used when a record does not name its own
    pub run_creator_key: Key,
}

/// What happened to one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(SynonymRecord),
    Rejected,
    /// Duplicate under the skip policy
    Skipped,
    Blank,
}

/// Rejections, warnings and counters of a finished pass
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub errors: ErrorLog,
    pub stats: RunStats,
}

pub struct RecordPipeline<'a> {
    settings: PipelineSettings,
    lookups: &'a LookupCache,
    resolver: Resolver<'a>,
    keys: KeyAllocator,
    errors: ErrorLog,
    stats: RunStats,
    progress: ProgressBar,
}

impl<'a> RecordPipeline<'a> {
    pub fn new(
        settings: PipelineSettings,
        store: &'a dyn SynonymStore,
        lookups: &'a LookupCache,
        keys: KeyAllocator,
    ) -> Self {
        let resolver = Resolver::new(store, settings.mgi_type_key);
        Self {
            settings,
            lookups,
            resolver,
            keys,
            errors: ErrorLog::new(),
            stats: RunStats::default(),
            progress: crate::progress::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Validate one line; `line_num` is 1-based
    pub async fn process_line(&mut self, line_num: usize, content: &str) -> Result<Outcome> {
        self.stats.lines_read += 1;
        self.progress.inc(1);

        // A line with a tab is a record, however empty its fields
        if !content.contains(INPUT_DELIMITER) && content.trim().is_empty() {
            debug!(line = line_num, "Skipping blank line");
            self.stats.skipped_blank += 1;
            return Ok(Outcome::Blank);
        }

        let record = match InputRecord::parse(line_num, content, self.settings.layout) {
            Ok(record) => record,
            Err(e) => match self.settings.malformed_lines {
                MalformedLinePolicy::Abort => {
                    return Err(LoadError::MalformedLine {
                        line: line_num,
                        expected: e.expected,
                        found: e.found,
                        content: content.to_string(),
                    });
                },
                MalformedLinePolicy::Reject => {
                    return Ok(self.reject(
                        line_num,
                        vec![RejectReason::MalformedLine {
                            expected: e.expected,
                            found: e.found,
                        }],
                    ));
                },
            },
        };

        self.validate(record).await
    }

    async fn validate(&mut self, record: InputRecord) -> Result<Outcome> {
        let line = record.line;
        let mut reasons = Vec::new();

        let has_text = !record.synonym.trim().is_empty();
        if !has_text {
            reasons.push(RejectReason::EmptySynonym);
        }

        let object_key = match self
            .resolver
            .resolve(IdentifierKind::Object, &record.accession_id)
            .await?
        {
            Resolution::Found(key) => key,
            _ => {
                reasons.push(RejectReason::UnknownObject {
                    accession_id: record.accession_id,
                });
                return Ok(self.reject(line, reasons));
            },
        };

        if has_text && self.lookups.existing.contains(&record.accession_id, &record.synonym) {
            let reason = RejectReason::DuplicateSynonym {
                accession_id: record.accession_id,
                synonym: record.synonym,
            };
            return Ok(match self.settings.duplicates {
                DuplicatePolicy::Reject => self.reject(line, vec![reason]),
                DuplicatePolicy::Skip => self.skip(line, reason),
            });
        }

        let synonym_type_key = self.lookups.synonym_types.get(&record.synonym_type);
        if synonym_type_key.is_none() {
            reasons.push(RejectReason::UnknownSynonymType {
                synonym_type: record.synonym_type.clone(),
            });
        }

        if record.synonym.contains(BCP_DELIMITER) {
            reasons.push(RejectReason::ReservedDelimiter {
                synonym: record.synonym.clone(),
            });
        }

        let reference = match record.jnum {
            Some(ref jnum) => self.resolver.resolve(IdentifierKind::Reference, jnum).await?,
            None => self.settings.run_reference,
        };
        if !reference.is_resolved() {
            reasons.push(RejectReason::UnknownReference {
                jnum: record.jnum.clone().unwrap_or_default(),
            });
        }

        let creator = match record.created_by {
            Some(ref login) => self.resolver.resolve(IdentifierKind::User, login).await?,
            None => Resolution::Found(self.settings.run_creator_key),
        };
        if !creator.is_resolved() {
            reasons.push(RejectReason::UnknownUser {
                login: record.created_by.clone().unwrap_or_default(),
            });
        }

        match (synonym_type_key, creator.key()) {
            (Some(synonym_type_key), Some(creator_key)) if reasons.is_empty() => {
                let synonym_key = self.keys.next_key();
                let row = SynonymRecord {
                    synonym_key,
                    object_key,
                    mgi_type_key: self.settings.mgi_type_key,
                    synonym_type_key,
                    reference_key: reference.key(),
                    synonym: record.synonym,
                    created_by_key: creator_key,
                    modified_by_key: creator_key,
                    creation_date: self.settings.load_date,
                    modification_date: self.settings.load_date,
                };
                self.stats.accepted += 1;
                self.stats.first_key.get_or_insert(synonym_key);
                self.stats.last_key = Some(synonym_key);
                Ok(Outcome::Accepted(row))
            },
            _ => Ok(self.reject(line, reasons)),
        }
    }

    fn reject(&mut self, line: usize, reasons: Vec<RejectReason>) -> Outcome {
        let rejection = Rejection { line, reasons };
        debug!(line, reason = %rejection, "Record rejected");
        self.errors.reject(rejection);
        self.stats.rejected += 1;
        Outcome::Rejected
    }

    fn skip(&mut self, line: usize, reason: RejectReason) -> Outcome {
        let warning = Warning { line, reason };
        debug!(line, warning = %warning, "Record skipped");
        self.errors.warn(warning);
        self.stats.warned += 1;
        Outcome::Skipped
    }

    /// Process every line of `input`, writing accepted rows to `output`
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut line_num = 0;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(move |e| LoadError::input_read(line_num + 1, e))?
        {
            line_num += 1;
            if let Outcome::Accepted(row) = self.process_line(line_num, &line).await? {
                output.write_all(row.to_bcp_line().as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
        }

        output.flush().await?;
        Ok(())
    }

    pub fn finish(self) -> PipelineReport {
        self.progress.finish_and_clear();
        PipelineReport {
            errors: self.errors,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::lookup::{ExistingSynonymIndex, SynonymTypeLookup};
    use crate::store::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_mgi_type("Marker", 2)
            .with_object("MGI:12345", 2, 10603)
            .with_object("MGI:2", 2, 20000)
            .with_reference("J:100", 7000)
            .with_user("jrs", 1001)
            .with_user("dbo", 1000)
    }

    fn lookups() -> LookupCache {
        LookupCache {
            synonym_types: SynonymTypeLookup::from_rows(vec![
                ("exact".to_string(), 1004),
                ("broad".to_string(), 1005),
            ]),
            existing: ExistingSynonymIndex::from_rows(vec![(
                "MGI:2".to_string(),
                "Known".to_string(),
            )]),
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            layout: RecordLayout::RunScoped,
            duplicates: DuplicatePolicy::Reject,
            malformed_lines: MalformedLinePolicy::Abort,
            load_date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            mgi_type_key: 2,
            run_reference: Resolution::NoReference,
            run_creator_key: 1001,
        }
    }

    #[tokio::test]
    async fn test_accepted_record() {
        let store = store();
        let lookups = lookups();
        let mut pipeline =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(1000));

        let outcome = pipeline
            .process_line(1, "MGI:12345\tTestSynonym\texact")
            .await
            .unwrap();
        let Outcome::Accepted(row) = outcome else {
            panic!("expected an accepted record, got {:?}", outcome);
        };
        assert_eq!(
            row.to_bcp_line(),
            "1000|10603|2|1004||TestSynonym|1001|1001|10/16/2026|10/16/2026"
        );
    }

    #[tokio::test]
    async fn test_unknown_object_short_circuits() {
        let store = store();
        let lookups = lookups();
        let mut pipeline =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(1000));

        let outcome = pipeline.process_line(1, "MGI:0\tFoo\tnonsense").await.unwrap();
        assert_eq!(outcome, Outcome::Rejected);

        let report = pipeline.finish();
        let lines: Vec<String> = report.errors.lines().collect();
        assert_eq!(lines, vec!["Invalid Object (1) MGI:0".to_string()]);
    }

    #[tokio::test]
    async fn test_reasons_accumulate_after_object() {
        let store = store();
        let lookups = lookups();
        let mut pipeline =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(1000));

        pipeline.process_line(3, "MGI:12345\t \tnonsense").await.unwrap();
        let report = pipeline.finish();
        let lines: Vec<String> = report.errors.lines().collect();
        assert_eq!(
            lines,
            vec!["Invalid Synonym:Empty (3); Invalid Synonym Type (3) nonsense".to_string()]
        );
        assert_eq!(report.stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_duplicate_policies() {
        let store = store();
        let lookups = lookups();

        let mut strict =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(1000));
        assert_eq!(
            strict.process_line(1, "MGI:2\tKnown\texact").await.unwrap(),
            Outcome::Rejected
        );
        assert!(matches!(
            strict.process_line(2, "MGI:2\tknown\texact").await.unwrap(),
            Outcome::Accepted(_)
        ));

        let lenient = PipelineSettings {
            duplicates: DuplicatePolicy::Skip,
            ..settings()
        };
        let mut lenient = RecordPipeline::new(lenient, &store, &lookups, KeyAllocator::new(1000));
        assert_eq!(
            lenient.process_line(1, "MGI:2\tKnown\texact").await.unwrap(),
            Outcome::Skipped
        );
        let report = lenient.finish();
        assert_eq!(report.stats.warned, 1);
        assert_eq!(report.stats.rejected, 0);
    }

    #[tokio::test]
    async fn test_reserved_delimiter_is_rejected() {
        let store = store();
        let lookups = lookups();
        let mut pipeline =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(1000));

        assert_eq!(
            pipeline.process_line(1, "MGI:12345\ta|b\texact").await.unwrap(),
            Outcome::Rejected
        );
    }

    #[tokio::test]
    async fn test_malformed_line_policies() {
        let store = store();
        let lookups = lookups();

        let mut strict =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(1000));
        let err = strict.process_line(4, "MGI:12345\tFoo").await.unwrap_err();
        assert!(matches!(err, LoadError::MalformedLine { line: 4, found: 2, .. }));

        let lenient = PipelineSettings {
            malformed_lines: MalformedLinePolicy::Reject,
            ..settings()
        };
        let mut lenient = RecordPipeline::new(lenient, &store, &lookups, KeyAllocator::new(1000));
        assert_eq!(
            lenient.process_line(4, "MGI:12345\tFoo").await.unwrap(),
            Outcome::Rejected
        );
        assert_eq!(lenient.process_line(5, "   ").await.unwrap(), Outcome::Blank);
    }

    #[tokio::test]
    async fn test_tab_only_line_is_not_blank() {
        let store = store();
        let lookups = lookups();
        let mut pipeline =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(1000));

        assert_eq!(pipeline.process_line(1, "\t\t").await.unwrap(), Outcome::Rejected);
        assert_eq!(pipeline.process_line(2, " \r").await.unwrap(), Outcome::Blank);

        let report = pipeline.finish();
        assert_eq!(report.stats.rejected, 1);
        assert_eq!(report.stats.skipped_blank, 1);
    }

    #[tokio::test]
    async fn test_per_record_reference_and_creator() {
        let store = store();
        let lookups = lookups();
        let per_record = PipelineSettings {
            layout: RecordLayout::PerRecord,
            ..settings()
        };
        let mut pipeline =
            RecordPipeline::new(per_record, &store, &lookups, KeyAllocator::new(1000));

        let outcome = pipeline
            .process_line(1, "MGI:12345\tA\tbroad\tJ:100\tdbo")
            .await
            .unwrap();
        let Outcome::Accepted(row) = outcome else {
            panic!("expected an accepted record, got {:?}", outcome);
        };
        assert_eq!(row.reference_key, Some(7000));
        assert_eq!(row.created_by_key, 1000);
        assert_eq!(row.synonym_type_key, 1005);

        let outcome = pipeline
            .process_line(2, "MGI:12345\tB\tbroad\tJ:404\tghost")
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Rejected);

        let report = pipeline.finish();
        let lines: Vec<String> = report.errors.lines().collect();
        assert_eq!(
            lines,
            vec!["Invalid Reference (2) J:404; Invalid User (2) ghost".to_string()]
        );
    }

    #[tokio::test]
    async fn test_run_writes_accepted_rows_in_order() {
        let store = store();
        let lookups = lookups();
        let mut pipeline =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(5000));

        let input: &[u8] = b"MGI:12345\tOne\texact\r\nMGI:0\tTwo\texact\n\nMGI:2\tThree\tbroad\n";
        let mut output = Vec::new();
        pipeline.run(input, &mut output).await.unwrap();

        let written = String::from_utf8(output).unwrap();
        let keys: Vec<&str> = written
            .lines()
            .map(|l| l.split('|').next().unwrap())
            .collect();
        assert_eq!(keys, vec!["5000", "5001"]);
        assert!(written.contains("|One|"));

        let report = pipeline.finish();
        assert_eq!(report.stats.lines_read, 4);
        assert_eq!(report.stats.accepted, 2);
        assert_eq!(report.stats.rejected, 1);
        assert_eq!(report.stats.skipped_blank, 1);
        assert_eq!(report.stats.first_key, Some(5000));
        assert_eq!(report.stats.last_key, Some(5001));
    }

    #[tokio::test]
    async fn test_invalid_utf8_names_the_line() {
        let store = store();
        let lookups = lookups();
        let mut pipeline =
            RecordPipeline::new(settings(), &store, &lookups, KeyAllocator::new(1000));

        let input: &[u8] = b"MGI:12345\tOne\texact\nMGI:\xff\tTwo\texact\n";
        let mut output = Vec::new();
        let err = pipeline.run(input, &mut output).await.unwrap_err();

        assert!(matches!(err, LoadError::Encoding { line: 2 }));
        assert_eq!(err.to_string(), "Invalid Line (2): not valid UTF-8");
    }
}
