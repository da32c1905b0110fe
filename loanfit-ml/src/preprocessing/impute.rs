//! Median imputation of missing numeric values.

use super::stats::nan_median;
use super::{Fit, Transform};
use crate::data::FeatureMatrix;
use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Fills `NaN` cells with the per-column median of the training matrix.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MedianImputer;

/// Learned per-column medians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedImputer {
    columns: Vec<String>,
    medians: Vec<f64>,
}

impl FittedImputer {
    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    pub fn median(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.medians[i])
    }
}

impl Fit for MedianImputer {
    type Fitted = FittedImputer;

    fn fit(&self, train: &FeatureMatrix) -> Result<FittedImputer, MlError> {
        let medians = train
            .columns()
            .iter()
            .zip(train.values().columns())
            .map(|(name, column)| {
                nan_median(column.iter()).ok_or_else(|| {
                    MlError::insufficient_samples(format!(
                        "column '{name}' has no observed values in the training partition"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            columns = medians.len(),
            missing = train.count_missing(),
            "Fitted median imputer"
        );
        Ok(FittedImputer {
            columns: train.columns().to_vec(),
            medians,
        })
    }
}

impl Transform for FittedImputer {
    fn transform(&self, data: &FeatureMatrix) -> Result<FeatureMatrix, MlError> {
        data.ensure_same_layout(&self.columns)?;
        let mut values = data.values().clone();
        for (mut column, &median) in values.columns_mut().into_iter().zip(&self.medians) {
            column.mapv_inplace(|v| if v.is_nan() { median } else { v });
        }
        data.with_values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix(values: ndarray::Array2<f64>) -> FeatureMatrix {
        FeatureMatrix::new(vec!["a".into(), "b".into()], values).unwrap()
    }

    #[test]
    fn test_fills_with_train_median() {
        let train = matrix(array![[1.0, f64::NAN], [3.0, 10.0], [f64::NAN, 20.0]]);
        let test = matrix(array![[f64::NAN, f64::NAN]]);
        let (fitted, train_out) = MedianImputer.fit_transform(&train).unwrap();
        assert_eq!(fitted.medians(), &[2.0, 15.0]);
        assert_eq!(train_out.count_missing(), 0);
        assert_eq!(fitted.transform(&test).unwrap().values(), &array![[2.0, 15.0]]);
    }

    #[test]
    fn test_fit_ignores_test_content() {
        let train = matrix(array![[1.0, 2.0], [5.0, 6.0]]);
        let fitted = MedianImputer.fit(&train).unwrap();
        let _ = fitted.transform(&matrix(array![[100.0, f64::NAN]])).unwrap();
        assert_eq!(fitted, MedianImputer.fit(&train).unwrap());
    }

    #[test]
    fn test_all_missing_column_is_error() {
        let train = matrix(array![[1.0, f64::NAN]]);
        assert!(MedianImputer.fit(&train).is_err());
    }

    #[test]
    fn test_layout_mismatch_is_error() {
        let fitted = MedianImputer.fit(&matrix(array![[1.0, 2.0]])).unwrap();
        let other = FeatureMatrix::new(vec!["b".into(), "a".into()], array![[1.0, 2.0]]).unwrap();
        assert!(fitted.transform(&other).is_err());
    }
}
