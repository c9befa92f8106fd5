//! CSV parsing for staged sales files.
//!
//! The header row names the destination columns. Values are kept as text and
//! converted by the database on insert; empty fields become `NULL`.

use std::collections::HashSet;
use std::path::Path;

use moon_core::{SqlIdentifier, ValidationError};
use serde_json::{Map, Value};

/// Reasons a staged file could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file was not valid CSV (including ragged rows).
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A header is not usable as a column name.
    #[error("invalid column header: {0}")]
    Header(#[from] ValidationError),

    /// The same column appears twice in the header.
    #[error("duplicate column \"{0}\" in header")]
    DuplicateColumn(String),

    /// The file has no header row.
    #[error("file has no header row")]
    MissingHeader,
}

/// Rows parsed from one CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesBatch {
    columns: Vec<SqlIdentifier>,
    rows: Vec<Vec<Option<String>>>,
}

impl SalesBatch {
    /// Parse CSV text with a header row.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(LoadError::MissingHeader);
        }

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(headers.len());
        for header in headers.iter() {
            let column = SqlIdentifier::new(header)?;
            if !seen.insert(column.as_str().to_ascii_lowercase()) {
                return Err(LoadError::DuplicateColumn(column.as_str().to_string()));
            }
            columns.push(column);
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }

        Ok(Self { columns, rows })
    }

    /// Read and parse a staged file.
    pub async fn from_path(path: &Path) -> Result<Self, crate::IngestError> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|source| crate::IngestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_reader(contents.as_slice())?)
    }

    /// Column names from the header.
    pub fn columns(&self) -> &[SqlIdentifier] {
        &self.columns
    }

    /// Data rows, one value per column.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the file had no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column name, `null` for empty fields.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| {
                        let value = value.clone().map(Value::String).unwrap_or(Value::Null);
                        (column.as_str().to_string(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let batch = SalesBatch::from_reader(
            "agent_id,product_id,sale_amount,core_reference_id\nA1,P1,120.00,REF-1\n".as_bytes(),
        )
        .unwrap();
        let names: Vec<_> = batch.columns().iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["agent_id", "product_id", "sale_amount", "core_reference_id"]);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.rows()[0][2].as_deref(), Some("120.00"));
    }

    #[test]
    fn empty_fields_are_null() {
        let batch = SalesBatch::from_reader("a,b\n1,\n".as_bytes()).unwrap();
        let records = batch.to_records();
        assert_eq!(records[0]["a"], Value::String("1".into()));
        assert_eq!(records[0]["b"], Value::Null);
    }

    #[test]
    fn header_only_file_is_empty() {
        let batch = SalesBatch::from_reader("a,b\n".as_bytes()).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn headers_are_trimmed() {
        let batch = SalesBatch::from_reader(" a , b \n1,2\n".as_bytes()).unwrap();
        assert_eq!(batch.columns()[1].as_str(), "b");
    }

    #[test]
    fn rejects_injection_in_header() {
        let err = SalesBatch::from_reader("a,\"b); DROP TABLE agent; --\"\n1,2\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, LoadError::Header(_)));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = SalesBatch::from_reader("a,A\n1,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateColumn(_)));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = SalesBatch::from_reader("a,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Csv(_)));
    }

    #[test]
    fn rejects_missing_header() {
        let err = SalesBatch::from_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::MissingHeader));
    }
}
