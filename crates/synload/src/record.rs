//! Input and output record formats
//!
//! # Input
//! One synonym per line, tab-separated:
//! ```text
//! MGI:12345	TestSynonym	exact
//! MGI:12345	TestSynonym	exact	J:12345	jrs
//! ```
//! The second form is the per-record layout, which carries its own
//! reference and creator.
//!
//! # Output
//! One `MGI_Synonym` row per accepted record, pipe-separated, in table
//! column order. [`SynonymRecord::to_bcp_line`] is the only place that
//! writes this format.

use crate::config::RecordLayout;
use crate::store::Key;
use chrono::NaiveDate;
use thiserror::Error;

/// Field separator of the input file.
pub const INPUT_DELIMITER: char = '\t';

/// Field separator of the bulk-load file.
pub const BCP_DELIMITER: char = '|';

/// Date format of the creation/modification columns.
pub const BCP_DATE_FORMAT: &str = "%m/%d/%Y";

/// Column order of the bulk-load file.
pub const BCP_COLUMNS: [&str; 10] = [
    "_Synonym_key",
    "_Object_key",
    "_MGIType_key",
    "_SynonymType_key",
    "_Refs_key",
    "synonym",
    "_CreatedBy_key",
    "_ModifiedBy_key",
    "creation_date",
    "modification_date",
];

/// A line with fewer fields than the layout requires
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected at least {expected} fields, found {found}")]
pub struct FieldCountError {
    pub expected: usize,
    pub found: usize,
}

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    /// 1-based line number in the input file
    pub line: usize,
    pub accession_id: String,
    pub synonym: String,
    pub synonym_type: String,
    /// Per-record reference; `None` when the run reference applies
    pub jnum: Option<String>,
    /// Per-record creator; `None` when the run creator applies
    pub created_by: Option<String>,
}

impl InputRecord {
    /// Split a line (without its newline) into a record
    ///
    /// Extra trailing fields are ignored. In the per-record layout an empty
    /// reference or creator field falls back to the run value.
    pub fn parse(
        line: usize,
        content: &str,
        layout: RecordLayout,
    ) -> std::result::Result<Self, FieldCountError> {
        let fields: Vec<&str> = content.split(INPUT_DELIMITER).collect();

        if fields.len() < layout.min_fields() {
            return Err(FieldCountError {
                expected: layout.min_fields(),
                found: fields.len(),
            });
        }

        let optional = |idx: usize| {
            fields
                .get(idx)
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(str::to_string)
        };

        let (jnum, created_by) = match layout {
            RecordLayout::RunScoped => (None, None),
            RecordLayout::PerRecord => (optional(3), optional(4)),
        };

        Ok(Self {
            line,
            accession_id: fields[0].to_string(),
            synonym: fields[1].to_string(),
            synonym_type: fields[2].to_string(),
            jnum,
            created_by,
        })
    }
}

/// Error reading a bulk-load line back
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BcpLineError {
    #[error("expected {expected} columns, found {0}", expected = BCP_COLUMNS.len())]
    ColumnCount(usize),
    #[error("column {column}: invalid value '{value}'")]
    Value { column: &'static str, value: String },
}

/// One `MGI_Synonym` row as written to the bulk-load file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymRecord {
    pub synonym_key: Key,
    pub object_key: Key,
    pub mgi_type_key: Key,
    pub synonym_type_key: Key,
    /// `None` for synonyms without a reference; written as an empty column
    pub reference_key: Option<Key>,
    pub synonym: String,
    pub created_by_key: Key,
    pub modified_by_key: Key,
    pub creation_date: NaiveDate,
    pub modification_date: NaiveDate,
}

impl SynonymRecord {
    /// Format the row for the bulk-load file (no trailing newline)
    pub fn to_bcp_line(&self) -> String {
        let reference = self
            .reference_key
            .map(|k| k.to_string())
            .unwrap_or_default();

        [
            self.synonym_key.to_string(),
            self.object_key.to_string(),
            self.mgi_type_key.to_string(),
            self.synonym_type_key.to_string(),
            reference,
            self.synonym.clone(),
            self.created_by_key.to_string(),
            self.modified_by_key.to_string(),
            self.creation_date.format(BCP_DATE_FORMAT).to_string(),
            self.modification_date.format(BCP_DATE_FORMAT).to_string(),
        ]
        .join(&BCP_DELIMITER.to_string())
    }

    /// Read a row written by [`Self::to_bcp_line`]
    pub fn from_bcp_line(line: &str) -> std::result::Result<Self, BcpLineError> {
        let cols: Vec<&str> = line.split(BCP_DELIMITER).collect();
        if cols.len() != BCP_COLUMNS.len() {
            return Err(BcpLineError::ColumnCount(cols.len()));
        }

        let key = |idx: usize| -> std::result::Result<Key, BcpLineError> {
            cols[idx].parse().map_err(|_| BcpLineError::Value {
                column: BCP_COLUMNS[idx],
                value: cols[idx].to_string(),
            })
        };
        let date = |idx: usize| -> std::result::Result<NaiveDate, BcpLineError> {
            NaiveDate::parse_from_str(cols[idx], BCP_DATE_FORMAT).map_err(|_| BcpLineError::Value {
                column: BCP_COLUMNS[idx],
                value: cols[idx].to_string(),
            })
        };

        Ok(Self {
            synonym_key: key(0)?,
            object_key: key(1)?,
            mgi_type_key: key(2)?,
            synonym_type_key: key(3)?,
            reference_key: if cols[4].is_empty() { None } else { Some(key(4)?) },
            synonym: cols[5].to_string(),
            created_by_key: key(6)?,
            modified_by_key: key(7)?,
            creation_date: date(8)?,
            modification_date: date(9)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_parse_run_scoped_line() {
        let record =
            InputRecord::parse(7, "MGI:12345\tTestSynonym\tsynonym type A", RecordLayout::RunScoped)
                .unwrap();
        assert_eq!(record.line, 7);
        assert_eq!(record.accession_id, "MGI:12345");
        assert_eq!(record.synonym, "TestSynonym");
        assert_eq!(record.synonym_type, "synonym type A");
        assert_eq!(record.jnum, None);
        assert_eq!(record.created_by, None);
    }

    #[test]
    fn test_parse_per_record_line() {
        let record = InputRecord::parse(
            1,
            "MGI:1\tShh-ps\tbroad\tJ:99\tjrs",
            RecordLayout::PerRecord,
        )
        .unwrap();
        assert_eq!(record.jnum.as_deref(), Some("J:99"));
        assert_eq!(record.created_by.as_deref(), Some("jrs"));

        let record =
            InputRecord::parse(2, "MGI:1\tShh-ps\tbroad\t\t", RecordLayout::PerRecord).unwrap();
        assert_eq!(record.jnum, None);
        assert_eq!(record.created_by, None);
    }

    #[test]
    fn test_parse_keeps_empty_synonym() {
        let record = InputRecord::parse(3, "MGI:1\t\texact", RecordLayout::RunScoped).unwrap();
        assert_eq!(record.synonym, "");
    }

    #[test]
    fn test_parse_too_few_fields() {
        let err = InputRecord::parse(1, "MGI:1\tFoo", RecordLayout::RunScoped).unwrap_err();
        assert_eq!(err, FieldCountError { expected: 3, found: 2 });

        let err = InputRecord::parse(1, "MGI:1\tFoo\texact", RecordLayout::PerRecord).unwrap_err();
        assert_eq!(err.expected, 5);
    }

    #[test]
    fn test_bcp_line_column_order() {
        let record = SynonymRecord {
            synonym_key: 1000,
            object_key: 10603,
            mgi_type_key: 2,
            synonym_type_key: 1004,
            reference_key: None,
            synonym: "TestSynonym".to_string(),
            created_by_key: 1001,
            modified_by_key: 1001,
            creation_date: date(),
            modification_date: date(),
        };

        assert_eq!(
            record.to_bcp_line(),
            "1000|10603|2|1004||TestSynonym|1001|1001|10/16/2026|10/16/2026"
        );
        assert_eq!(SynonymRecord::from_bcp_line(&record.to_bcp_line()).unwrap(), record);
    }

    #[test]
    fn test_bcp_line_errors() {
        assert_eq!(
            SynonymRecord::from_bcp_line("1|2|3").unwrap_err(),
            BcpLineError::ColumnCount(3)
        );
        assert_eq!(
            BcpLineError::ColumnCount(3).to_string(),
            "expected 10 columns, found 3"
        );
        let err = SynonymRecord::from_bcp_line("x|1|2|3||s|1|1|10/16/2026|10/16/2026").unwrap_err();
        assert!(matches!(err, BcpLineError::Value { column: "_Synonym_key", .. }));
    }
}
