//! Data quality validation of a raw applicant table.

use crate::data::source::RawTable;
use crate::preprocessing::{AnomalyRule, OrdinalMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A data quality report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    /// Percentage of missing cells per column.
    pub missing_percentage: BTreeMap<String, f64>,
    pub duplicate_rows: usize,
    /// Raw label value to row count.
    pub label_distribution: BTreeMap<String, usize>,
    /// Rows above each anomaly rule's bound.
    pub out_of_range: BTreeMap<String, usize>,
    /// Raw categorical values no fixed mapping accepts.
    pub unmapped_values: BTreeMap<String, Vec<String>>,
    pub overall_score: f64,
    pub passed_gate: bool,
}

/// Validate a raw table and produce a quality report.
///
/// Columns named by `ordinal` or `anomaly_rules` that are absent from the
/// table are skipped; required-column checks happen elsewhere.
pub fn validate_table(
    table: &RawTable,
    label_column: &str,
    ordinal: &[OrdinalMap],
    anomaly_rules: &[AnomalyRule],
    quality_threshold: f64,
) -> DataQualityReport {
    let total_rows = table.row_count();
    let total_columns = table.column_count();

    let mut missing_percentage = BTreeMap::new();
    for (i, col) in table.columns.iter().enumerate() {
        let missing = table.column_values(i).filter(Option::is_none).count();
        let pct = if total_rows > 0 {
            missing as f64 / total_rows as f64 * 100.0
        } else {
            0.0
        };
        missing_percentage.insert(col.clone(), pct);
    }

    let mut seen = HashSet::new();
    let duplicate_rows = table.rows.iter().filter(|row| !seen.insert(*row)).count();

    let mut label_distribution = BTreeMap::new();
    if let Some(idx) = table.column_index(label_column) {
        for value in table.column_values(idx) {
            *label_distribution
                .entry(value.unwrap_or("<missing>").to_string())
                .or_insert(0) += 1;
        }
    }

    let mut out_of_range = BTreeMap::new();
    for rule in anomaly_rules {
        if let Some(idx) = table.column_index(&rule.column) {
            let count = table
                .column_values(idx)
                .flatten()
                .filter_map(|v| v.parse::<f64>().ok())
                .filter(|v| *v > rule.max)
                .count();
            out_of_range.insert(rule.column.clone(), count);
        }
    }

    let mut unmapped_values = BTreeMap::new();
    for map in ordinal {
        if let Ok(values) = map.unmapped_values(table) {
            if !values.is_empty() {
                unmapped_values.insert(map.column.clone(), values);
            }
        }
    }

    let avg_missing = if missing_percentage.is_empty() {
        0.0
    } else {
        missing_percentage.values().sum::<f64>() / missing_percentage.len() as f64
    };
    let dup_penalty = if total_rows > 0 {
        duplicate_rows as f64 / total_rows as f64
    } else {
        0.0
    };
    let unmapped_penalty = if unmapped_values.is_empty() { 0.0 } else { 0.1 };
    let overall_score = (1.0 - avg_missing / 100.0 - dup_penalty - unmapped_penalty).clamp(0.0, 1.0);
    let passed_gate = total_rows > 0 && overall_score >= quality_threshold;

    DataQualityReport {
        total_rows,
        total_columns,
        missing_percentage,
        duplicate_rows,
        label_distribution,
        out_of_range,
        unmapped_values,
        overall_score,
        passed_gate,
    }
}

impl std::fmt::Display for DataQualityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Rows: {}  Columns: {}", self.total_rows, self.total_columns)?;
        writeln!(f, "Duplicate rows: {}", self.duplicate_rows)?;
        writeln!(f, "Missing values (%):")?;
        for (col, pct) in self.missing_percentage.iter().filter(|(_, p)| **p > 0.0) {
            writeln!(f, "  {col:<32} {pct:>6.2}")?;
        }
        writeln!(f, "Label distribution:")?;
        for (label, count) in &self.label_distribution {
            writeln!(f, "  {label:<32} {count}")?;
        }
        writeln!(f, "Out-of-range values:")?;
        for (col, count) in &self.out_of_range {
            writeln!(f, "  {col:<32} {count}")?;
        }
        if !self.unmapped_values.is_empty() {
            writeln!(f, "Unmapped categorical values:")?;
            for (col, values) in &self.unmapped_values {
                writeln!(f, "  {col:<32} {}", values.join(", "))?;
            }
        }
        write!(
            f,
            "Quality score: {:.3} ({})",
            self.overall_score,
            if self.passed_gate { "passed" } else { "failed" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{PERSON_AGE, PERSON_GENDER};

    fn sample() -> RawTable {
        RawTable::new(
            vec![PERSON_AGE.into(), PERSON_GENDER.into(), "loan_status".into()],
            vec![
                vec!["25".into(), "male".into(), "0".into()],
                vec!["150".into(), "robot".into(), "1".into()],
                vec!["".into(), "female".into(), "0".into()],
                vec!["25".into(), "male".into(), "0".into()],
            ],
        )
    }

    #[test]
    fn test_validate_table() {
        let report = validate_table(
            &sample(),
            "loan_status",
            &[OrdinalMap::gender()],
            &[AnomalyRule::new(PERSON_AGE, 100.0)],
            0.5,
        );
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.missing_percentage[PERSON_AGE], 25.0);
        assert_eq!(report.label_distribution["0"], 3);
        assert_eq!(report.out_of_range[PERSON_AGE], 1);
        assert_eq!(report.unmapped_values[PERSON_GENDER], vec!["robot".to_string()]);
        assert!(report.passed_gate);
    }

    #[test]
    fn test_empty_table_fails_gate() {
        let table = RawTable::new(vec!["loan_status".into()], vec![]);
        let report = validate_table(&table, "loan_status", &[], &[], 0.0);
        assert!(!report.passed_gate);
    }
}
