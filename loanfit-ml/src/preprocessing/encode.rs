//! Categorical feature encoding for the applicant table.
//!
//! Ordinal and binary columns go through fixed [`OrdinalMap`] tables. Nominal
//! columns are one-hot encoded with categories learned from the training rows;
//! a category first seen at transform time produces an all-zero indicator row.

use crate::data::schema::{
    LOAN_INTENT, LOAN_STATUS, PERSON_EDUCATION, PERSON_GENDER, PERSON_HOME_OWNERSHIP,
    PREVIOUS_LOAN_DEFAULTS,
};
use crate::data::{FeatureMatrix, RawTable};
use crate::error::MlError;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fixed mapping from category labels to integer codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdinalMap {
    pub column: String,
    /// Raw spellings rewritten to a canonical category before lookup.
    pub aliases: Vec<(String, String)>,
    /// Canonical categories; the position is the code.
    pub categories: Vec<String>,
}

impl OrdinalMap {
    pub fn new(column: &str, categories: &[&str]) -> Self {
        Self {
            column: column.to_string(),
            aliases: Vec::new(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_alias(mut self, raw: &str, canonical: &str) -> Self {
        self.aliases.push((raw.to_string(), canonical.to_string()));
        self
    }

    /// `female` = 0, `male` = 1, after folding the `Male` and `fe male` spellings.
    pub fn gender() -> Self {
        Self::new(PERSON_GENDER, &["female", "male"])
            .with_alias("Male", "male")
            .with_alias("fe male", "female")
    }

    pub fn education() -> Self {
        Self::new(
            PERSON_EDUCATION,
            &["High School", "Associate", "Bachelor", "Master", "Doctorate"],
        )
    }

    pub fn previous_defaults() -> Self {
        Self::new(PREVIOUS_LOAN_DEFAULTS, &["No", "Yes"])
    }

    /// Apply aliases to a raw value.
    pub fn normalize<'a>(&'a self, raw: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(from, _)| from == raw)
            .map(|(_, to)| to.as_str())
            .unwrap_or(raw)
    }

    /// Code for a raw value, or `None` when it falls outside the table.
    pub fn encode(&self, raw: &str) -> Option<f64> {
        let canonical = self.normalize(raw);
        self.categories
            .iter()
            .position(|c| c == canonical)
            .map(|code| code as f64)
    }

    /// Canonical category for a code.
    pub fn decode(&self, code: f64) -> Option<&str> {
        if code.fract() != 0.0 || code < 0.0 {
            return None;
        }
        self.categories.get(code as usize).map(String::as_str)
    }

    /// Distinct raw values in `table` that this map cannot encode.
    pub fn unmapped_values(&self, table: &RawTable) -> Result<Vec<String>, MlError> {
        let col = table.require_column(&self.column)?;
        let unmapped: BTreeSet<String> = table
            .column_values(col)
            .flatten()
            .filter(|v| self.encode(v).is_none())
            .map(str::to_string)
            .collect();
        Ok(unmapped.into_iter().collect())
    }
}

/// Unfitted encoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    pub label_column: String,
    pub ordinal: Vec<OrdinalMap>,
    pub nominal: Vec<String>,
}

impl FeatureEncoder {
    /// Encoder for the loan applicant schema.
    pub fn loan_default(label_column: &str) -> Self {
        Self {
            label_column: label_column.to_string(),
            ordinal: vec![
                OrdinalMap::gender(),
                OrdinalMap::education(),
                OrdinalMap::previous_defaults(),
            ],
            nominal: vec![PERSON_HOME_OWNERSHIP.to_string(), LOAN_INTENT.to_string()],
        }
    }

    /// Learn nominal categories from the training rows.
    pub fn fit(&self, train: &RawTable) -> Result<FittedEncoder, MlError> {
        train.require_column(&self.label_column)?;
        for map in &self.ordinal {
            train.require_column(&map.column)?;
        }

        let mut nominal = Vec::with_capacity(self.nominal.len());
        for column in &self.nominal {
            let idx = train.require_column(column)?;
            let categories: BTreeSet<String> = train
                .column_values(idx)
                .flatten()
                .map(str::to_string)
                .collect();
            nominal.push((column.clone(), categories.into_iter().collect::<Vec<_>>()));
        }

        let kept: Vec<String> = train
            .columns
            .iter()
            .filter(|c| {
                **c != self.label_column && *c != LOAN_STATUS && !self.nominal.contains(c)
            })
            .cloned()
            .collect();

        let mut output_columns = kept.clone();
        for (column, categories) in &nominal {
            for category in categories {
                let name = format!("{column}_{category}");
                if output_columns.contains(&name) {
                    return Err(MlError::dataset(format!(
                        "indicator column '{name}' collides with an existing column"
                    )));
                }
                output_columns.push(name);
            }
        }

        tracing::debug!(
            features = output_columns.len(),
            indicators = output_columns.len() - kept.len(),
            "Fitted categorical encoder"
        );

        Ok(FittedEncoder {
            label_column: self.label_column.clone(),
            ordinal: self.ordinal.clone(),
            kept_columns: kept,
            nominal,
            output_columns,
        })
    }
}

/// Encoder with learned one-hot categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedEncoder {
    label_column: String,
    ordinal: Vec<OrdinalMap>,
    kept_columns: Vec<String>,
    nominal: Vec<(String, Vec<String>)>,
    output_columns: Vec<String>,
}

impl FittedEncoder {
    pub fn output_columns(&self) -> &[String] {
        &self.output_columns
    }

    /// Learned categories for a nominal column.
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.nominal
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, cats)| cats.as_slice())
    }

    /// Encode all feature columns of `table` into a numeric matrix.
    pub fn transform(&self, table: &RawTable) -> Result<FeatureMatrix, MlError> {
        let n_rows = table.row_count();
        let mut values = Array2::<f64>::zeros((n_rows, self.output_columns.len()));
        let mut unmapped: BTreeMap<&str, usize> = BTreeMap::new();

        for (out_idx, column) in self.kept_columns.iter().enumerate() {
            let src = table.require_column(column)?;
            let map = self.ordinal.iter().find(|m| m.column == *column);
            for (row, cell) in table.column_values(src).enumerate() {
                values[[row, out_idx]] = match (cell, map) {
                    (None, _) => f64::NAN,
                    (Some(raw), Some(map)) => map.encode(raw).unwrap_or_else(|| {
                        *unmapped.entry(column.as_str()).or_insert(0) += 1;
                        f64::NAN
                    }),
                    (Some(raw), None) => raw.parse::<f64>().unwrap_or_else(|_| {
                        *unmapped.entry(column.as_str()).or_insert(0) += 1;
                        f64::NAN
                    }),
                };
            }
        }

        let mut offset = self.kept_columns.len();
        for (column, categories) in &self.nominal {
            let src = table.require_column(column)?;
            for (row, cell) in table.column_values(src).enumerate() {
                if let Some(pos) = cell.and_then(|c| categories.iter().position(|k| k == c)) {
                    values[[row, offset + pos]] = 1.0;
                }
            }
            offset += categories.len();
        }

        for (column, count) in &unmapped {
            tracing::warn!(column, count, "Values outside the encodable domain set to missing");
        }

        FeatureMatrix::new(self.output_columns.clone(), values)
    }

    /// Parse the label column as non-negative integer class indices.
    pub fn labels(&self, table: &RawTable) -> Result<Array1<usize>, MlError> {
        parse_labels(table, &self.label_column)
    }
}

/// Parse a label column as class indices. Missing or non-integer labels are errors.
pub fn parse_labels(table: &RawTable, label_column: &str) -> Result<Array1<usize>, MlError> {
    let idx = table.require_column(label_column)?;
    table
        .column_values(idx)
        .enumerate()
        .map(|(row, cell)| {
            let raw = cell.ok_or_else(|| {
                MlError::invalid_input(format!("row {row}: missing '{label_column}'"))
            })?;
            if let Ok(v) = raw.parse::<usize>() {
                return Ok(v);
            }
            match raw.parse::<f64>() {
                Ok(v) if v >= 0.0 && v.fract() == 0.0 && v < usize::MAX as f64 => Ok(v as usize),
                _ => Err(MlError::invalid_input(format!(
                    "row {row}: '{label_column}' value '{raw}' is not a class index"
                ))),
            }
        })
        .collect()
}
