//! Business-rule clamping of implausible values.

use super::stats::nan_median;
use super::{Fit, Transform};
use crate::data::FeatureMatrix;
use crate::data::schema::{PERSON_AGE, PERSON_EMP_EXP};
use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Values above `max` in `column` are treated as data-entry errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRule {
    pub column: String,
    pub max: f64,
}

impl AnomalyRule {
    pub fn new(column: &str, max: f64) -> Self {
        Self {
            column: column.to_string(),
            max,
        }
    }
}

/// Rules applied after imputation and before scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyFixer {
    pub rules: Vec<AnomalyRule>,
}

impl Default for AnomalyFixer {
    fn default() -> Self {
        Self {
            rules: vec![
                AnomalyRule::new(PERSON_AGE, 100.0),
                AnomalyRule::new(PERSON_EMP_EXP, 75.0),
            ],
        }
    }
}

/// Replacement value per rule: the training median over values within bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedAnomalyFixer {
    columns: Vec<String>,
    replacements: Vec<(AnomalyRule, usize, f64)>,
}

impl FittedAnomalyFixer {
    /// Replacement learned for `column`.
    pub fn replacement(&self, column: &str) -> Option<f64> {
        self.replacements
            .iter()
            .find(|(rule, _, _)| rule.column == column)
            .map(|(_, _, value)| *value)
    }

    /// Number of cells in `data` each rule would overwrite.
    pub fn count_anomalies(&self, data: &FeatureMatrix) -> Vec<(String, usize)> {
        self.replacements
            .iter()
            .map(|(rule, idx, _)| {
                let count = data
                    .values()
                    .column(*idx)
                    .iter()
                    .filter(|v| **v > rule.max)
                    .count();
                (rule.column.clone(), count)
            })
            .collect()
    }
}

impl Fit for AnomalyFixer {
    type Fitted = FittedAnomalyFixer;

    fn fit(&self, train: &FeatureMatrix) -> Result<FittedAnomalyFixer, MlError> {
        let mut replacements = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let idx = train
                .column_index(&rule.column)
                .ok_or_else(|| MlError::missing_column(rule.column.clone()))?;
            let valid: Vec<f64> = train
                .values()
                .column(idx)
                .iter()
                .copied()
                .filter(|v| *v <= rule.max)
                .collect();
            let median = nan_median(&valid).ok_or_else(|| {
                MlError::insufficient_samples(format!(
                    "no training values of '{}' within {}",
                    rule.column, rule.max
                ))
            })?;
            tracing::debug!(column = %rule.column, max = rule.max, median, "Fitted anomaly rule");
            replacements.push((rule.clone(), idx, median));
        }
        Ok(FittedAnomalyFixer {
            columns: train.columns().to_vec(),
            replacements,
        })
    }
}

impl Transform for FittedAnomalyFixer {
    fn transform(&self, data: &FeatureMatrix) -> Result<FeatureMatrix, MlError> {
        data.ensure_same_layout(&self.columns)?;
        let mut values = data.values().clone();
        for (rule, idx, replacement) in &self.replacements {
            let mut fixed = 0usize;
            for v in values.column_mut(*idx).iter_mut() {
                if *v > rule.max {
                    *v = *replacement;
                    fixed += 1;
                }
            }
            if fixed > 0 {
                tracing::info!(column = %rule.column, fixed, replacement, "Clamped out-of-range values");
            }
        }
        data.with_values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix(values: ndarray::Array2<f64>) -> FeatureMatrix {
        FeatureMatrix::new(vec![PERSON_AGE.into(), PERSON_EMP_EXP.into()], values).unwrap()
    }

    #[test]
    fn test_replaces_with_median_of_valid_values() {
        let train = matrix(array![[20.0, 1.0], [150.0, 2.0], [30.0, 90.0], [40.0, 4.0]]);
        let (fitted, fixed) = AnomalyFixer::default().fit_transform(&train).unwrap();
        assert_eq!(fitted.replacement(PERSON_AGE), Some(30.0));
        assert_eq!(fitted.replacement(PERSON_EMP_EXP), Some(2.0));
        assert_eq!(fixed.column(PERSON_AGE).unwrap().to_vec(), vec![20.0, 30.0, 30.0, 40.0]);
        assert_eq!(fixed.column(PERSON_EMP_EXP).unwrap().to_vec(), vec![1.0, 2.0, 2.0, 4.0]);
    }

    #[test]
    fn test_test_partition_uses_train_replacement() {
        let train = matrix(array![[20.0, 1.0], [40.0, 3.0]]);
        let test = matrix(array![[120.0, 80.0], [50.0, 5.0]]);
        let fitted = AnomalyFixer::default().fit(&train).unwrap();
        assert_eq!(fitted.count_anomalies(&test), vec![
            (PERSON_AGE.to_string(), 1),
            (PERSON_EMP_EXP.to_string(), 1)
        ]);
        let fixed = fitted.transform(&test).unwrap();
        assert_eq!(fixed.values(), &array![[30.0, 2.0], [50.0, 5.0]]);
    }

    #[test]
    fn test_boundary_value_is_kept() {
        let train = matrix(array![[100.0, 75.0], [20.0, 1.0]]);
        let fixed = AnomalyFixer::default().fit_transform(&train).unwrap().1;
        assert_eq!(fixed.values(), train.values());
    }

    #[test]
    fn test_missing_rule_column_is_error() {
        let train = FeatureMatrix::new(vec!["x".into()], array![[1.0]]).unwrap();
        assert!(AnomalyFixer::default().fit(&train).is_err());
    }
}
