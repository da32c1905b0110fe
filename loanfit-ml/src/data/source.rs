//! Data source abstraction for loading the applicant table.

use crate::data::schema::{SchemaDefinition, infer_schema};
use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cell tokens treated as missing in addition to the empty string.
const MISSING_TOKENS: &[&str] = &["NA", "NaN", "nan", "null", "NULL"];

/// A raw table of string cells, exactly as read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like [`RawTable::column_index`] but reports the missing column as an error.
    pub fn require_column(&self, name: &str) -> Result<usize, MlError> {
        self.column_index(name)
            .ok_or_else(|| MlError::missing_column(name))
    }

    /// Cell value with missing tokens mapped to `None`.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.trim())
            .filter(|s| !is_missing(s))
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.rows.len()).map(move |row| self.cell(row, col))
    }

    /// A new table holding only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}

/// Whether a trimmed cell counts as missing.
pub fn is_missing(cell: &str) -> bool {
    cell.is_empty() || MISSING_TOKENS.contains(&cell)
}

/// Information about a data source for logging and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
    pub row_count: Option<usize>,
}

/// Trait for loading a raw table from a source.
pub trait DataSource {
    /// Load data from this source, optionally limiting the number of rows.
    fn load(&self, limit: Option<usize>) -> Result<RawTable, MlError>;

    /// Return metadata about this source.
    fn source_info(&self) -> DataSourceInfo;

    /// Infer the schema of this source from a sample of rows.
    fn schema(&self) -> Result<SchemaDefinition, MlError> {
        let sample = self.load(Some(100))?;
        Ok(infer_schema(&sample))
    }
}

// ---------------------------------------------------------------------------
// CsvSource
// ---------------------------------------------------------------------------

/// Delimited text file data source.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: ',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn delimiter_byte(&self) -> Result<u8, MlError> {
        u8::try_from(self.delimiter).map_err(|_| {
            MlError::config(format!(
                "delimiter must be a single-byte character, got '{}'",
                self.delimiter
            ))
        })
    }
}

impl DataSource for CsvSource {
    fn load(&self, limit: Option<usize>) -> Result<RawTable, MlError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter_byte()?)
            .trim(csv::Trim::All)
            .flexible(false)
            .from_path(&self.path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(MlError::dataset(format!(
                "{} has no header row",
                self.path.display()
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            if limit.is_some_and(|max| rows.len() >= max) {
                break;
            }
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        tracing::debug!(
            path = %self.path.display(),
            rows = rows.len(),
            columns = columns.len(),
            "Loaded delimited file"
        );
        Ok(RawTable { columns, rows })
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
            row_count: None,
        }
    }
}
