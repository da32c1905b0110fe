//! Dense numeric feature matrix with named columns.

use crate::error::MlError;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named columns over a dense `f64` matrix. Missing values are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self, MlError> {
        if columns.len() != values.ncols() {
            return Err(MlError::invalid_input(format!(
                "{} column names for a matrix with {} columns",
                columns.len(),
                values.ncols()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Build from row vectors, all of the same width as `columns`.
    pub fn from_rows(columns: Vec<String>, rows: &[Vec<f64>]) -> Result<Self, MlError> {
        let width = columns.len();
        let mut flat = Vec::with_capacity(rows.len() * width);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(MlError::invalid_input(format!(
                    "row {i} has {} values, expected {width}",
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        let values = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| MlError::invalid_input(e.to_string()))?;
        Self::new(columns, values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>, MlError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| MlError::missing_column(name))?;
        Ok(self.values.column(idx))
    }

    /// Same columns, new values. Shape must match.
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self, MlError> {
        if values.dim() != self.values.dim() {
            return Err(MlError::invalid_input(format!(
                "shape {:?} does not match {:?}",
                values.dim(),
                self.values.dim()
            )));
        }
        Ok(Self {
            columns: self.columns.clone(),
            values,
        })
    }

    /// Rows at the given indices, in order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Append rows with the same column layout.
    pub fn append_rows(&self, rows: &Array2<f64>) -> Result<Self, MlError> {
        if rows.ncols() != self.n_cols() {
            return Err(MlError::invalid_input(format!(
                "cannot append {} columns to {}",
                rows.ncols(),
                self.n_cols()
            )));
        }
        let values = ndarray::concatenate(Axis(0), &[self.values.view(), rows.view()])
            .map_err(|e| MlError::invalid_input(e.to_string()))?;
        Ok(Self {
            columns: self.columns.clone(),
            values,
        })
    }

    /// Error unless `other` has exactly the same column names in the same order.
    pub fn ensure_same_layout(&self, other: &[String]) -> Result<(), MlError> {
        if self.columns != other {
            return Err(MlError::invalid_input(format!(
                "column layout mismatch: fitted on {:?}, got {:?}",
                other, self.columns
            )));
        }
        Ok(())
    }

    pub fn count_missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }
}

/// Count of samples per class label, ordered by label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDistribution(pub BTreeMap<usize, usize>);

impl ClassDistribution {
    pub fn from_labels(labels: &Array1<usize>) -> Self {
        let mut counts = BTreeMap::new();
        for &label in labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn count(&self, label: usize) -> usize {
        self.0.get(&label).copied().unwrap_or(0)
    }

    pub fn classes(&self) -> Vec<usize> {
        self.0.keys().copied().collect()
    }

    /// True when every class has the same number of samples.
    pub fn is_balanced(&self) -> bool {
        let mut counts = self.0.values();
        match counts.next() {
            Some(first) => counts.all(|c| c == first),
            None => true,
        }
    }
}

impl std::fmt::Display for ClassDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (label, count) in &self.0 {
            writeln!(f, "{label:>5}  {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_rows_and_column() {
        let m = FeatureMatrix::from_rows(
            vec!["a".into(), "b".into()],
            &[vec![1.0, 2.0], vec![3.0, 4.0]],
        )
        .unwrap();
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.column("b").unwrap().to_vec(), vec![2.0, 4.0]);
        assert!(m.column("c").is_err());
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let result = FeatureMatrix::from_rows(vec!["a".into()], &[vec![1.0, 2.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_append_and_select_rows() {
        let m = FeatureMatrix::new(vec!["a".into()], array![[1.0], [2.0]]).unwrap();
        let grown = m.append_rows(&array![[3.0]]).unwrap();
        assert_eq!(grown.n_rows(), 3);
        let picked = grown.select_rows(&[2, 0]);
        assert_eq!(picked.values(), &array![[3.0], [1.0]]);
    }

    #[test]
    fn test_class_distribution() {
        let dist = ClassDistribution::from_labels(&array![0, 1, 0, 0]);
        assert_eq!(dist.count(0), 3);
        assert_eq!(dist.count(1), 1);
        assert_eq!(dist.count(2), 0);
        assert!(!dist.is_balanced());
        assert!(ClassDistribution::from_labels(&array![1, 0]).is_balanced());
    }
}
