//! CSV parsing into preview rows
//!
//! Every data line becomes a [`PreviewRow`]. Rows failing validation stay in
//! the preview with their issues attached so the user can see what will be
//! skipped.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use lg_core::record::{FieldKey, Record};
use lg_core::{ValidationError, Value};
use tracing::debug;

use crate::config::NullConfig;
use crate::DataError;

/// A parsed, not yet committed import row
#[derive(Debug, Clone)]
pub struct PreviewRow<R: Record> {
    /// Line in the source file (the header is line 1)
    pub line: usize,
    /// Parsed values of the mapped columns
    pub values: Vec<(R::Field, Value)>,
    /// Validation problems; empty for valid rows
    pub issues: Vec<ValidationError>,
    draft: Option<R::Draft>,
}

impl<R: Record> PreviewRow<R> {
    fn parse(line: usize, columns: &[Option<R::Field>], record: &StringRecord, nulls: &NullConfig) -> Self {
        let mut values = Vec::new();
        let mut issues = Vec::new();

        for (column, raw) in columns.iter().zip(record.iter()) {
            let Some(field) = column else { continue };
            match nulls.cell(raw) {
                None => values.push((*field, Value::Null)),
                Some(text) => match R::parse_value(*field, text) {
                    Ok(value) => values.push((*field, value)),
                    Err(issue) => issues.push(issue),
                },
            }
        }

        for required in R::required_fields() {
            let present = values
                .iter()
                .any(|(field, value)| field == required && !value.is_null());
            let flagged = issues.iter().any(|issue| issue.field() == required.name());
            if !present && !flagged {
                issues.push(ValidationError::Required { field: required.name() });
            }
        }

        let draft = if issues.is_empty() {
            match R::draft_from(&values) {
                Ok(draft) => Some(draft),
                Err(issue) => {
                    issues.push(issue);
                    None
                }
            }
        } else {
            None
        };

        Self { line, values, issues, draft }
    }

    /// A line whose bytes are not UTF-8; kept so it shows up as skipped
    fn undecodable(line: usize, columns: &[Option<R::Field>], record: &ByteRecord) -> Self {
        let bad_cell = columns
            .iter()
            .zip(record.iter())
            .find(|(_, cell)| std::str::from_utf8(cell).is_err());
        let (field, value) = match bad_cell {
            Some((column, cell)) => (
                column.map(|field| field.name()).unwrap_or("row"),
                String::from_utf8_lossy(cell).into_owned(),
            ),
            None => ("row", String::new()),
        };
        Self {
            line,
            values: Vec::new(),
            issues: vec![ValidationError::Invalid {
                field,
                value,
                reason: "invalid UTF-8",
            }],
            draft: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.draft.is_some()
    }

    pub fn draft(&self) -> Option<&R::Draft> {
        self.draft.as_ref()
    }

    pub fn value(&self, field: R::Field) -> Option<&Value> {
        self.values.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }

    /// Issues joined for display next to the row
    pub fn issue_summary(&self) -> String {
        self.issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Result of parsing an uploaded file
#[derive(Debug, Clone)]
pub struct CsvPreview<R: Record> {
    pub source_name: String,
    pub headers: Vec<String>,
    /// Column mapping, parallel to `headers`
    pub columns: Vec<Option<R::Field>>,
    /// Headers that matched no field (or repeated one)
    pub unmapped_headers: Vec<String>,
    pub rows: Vec<PreviewRow<R>>,
}

impl<R: Record> CsvPreview<R> {
    pub fn valid_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_valid()).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.rows.len() - self.valid_count()
    }

    pub fn valid_rows(&self) -> impl Iterator<Item = &PreviewRow<R>> {
        self.rows.iter().filter(|row| row.is_valid())
    }

    pub fn invalid_rows(&self) -> impl Iterator<Item = &PreviewRow<R>> {
        self.rows.iter().filter(|row| !row.is_valid())
    }

    /// Insert payloads of the valid rows, with their source lines
    pub fn drafts(&self) -> Vec<(usize, R::Draft)> {
        self.rows
            .iter()
            .filter_map(|row| row.draft.clone().map(|draft| (row.line, draft)))
            .collect()
    }
}

/// Parse CSV text into a preview
pub fn parse_csv<R: Record, Rd: Read>(
    source_name: &str,
    reader: Rd,
    nulls: &NullConfig,
) -> Result<CsvPreview<R>, DataError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(DataError::MissingHeader);
    }

    let mut columns: Vec<Option<R::Field>> = Vec::with_capacity(headers.len());
    let mut unmapped_headers = Vec::new();
    for header in &headers {
        match R::Field::from_header(header) {
            Some(field) if !columns.contains(&Some(field)) => columns.push(Some(field)),
            _ => {
                unmapped_headers.push(header.clone());
                columns.push(None);
            }
        }
    }

    let mut rows = Vec::new();
    for (idx, result) in csv_reader.byte_records().enumerate() {
        let raw = result?;
        let line = raw
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(idx + 2);
        let record = match StringRecord::from_byte_record(raw) {
            Ok(record) => record,
            Err(err) => {
                rows.push(PreviewRow::undecodable(line, &columns, &err.into_byte_record()));
                continue;
            }
        };
        if record.iter().all(|cell| nulls.is_null(cell)) {
            continue;
        }
        rows.push(PreviewRow::parse(line, &columns, &record, nulls));
    }

    debug!(
        source = source_name,
        rows = rows.len(),
        unmapped = unmapped_headers.len(),
        "parsed CSV preview"
    );

    Ok(CsvPreview {
        source_name: source_name.to_string(),
        headers,
        columns,
        unmapped_headers,
        rows,
    })
}

/// Parse a CSV file from disk
pub fn read_csv_file<R: Record>(path: &Path, nulls: &NullConfig) -> Result<CsvPreview<R>, DataError> {
    let file = File::open(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv");
    parse_csv(name, BufReader::new(file), nulls)
}
