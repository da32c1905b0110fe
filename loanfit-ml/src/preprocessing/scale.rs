//! Robust scaling: centre on the median, divide by the interquartile range.

use super::stats::{percentile_sorted, sorted_finite};
use super::{Fit, Transform};
use crate::data::FeatureMatrix;
use crate::error::MlError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustScaler {
    /// Lower and upper percentile of the scaling range.
    pub quantile_range: (f64, f64),
}

impl Default for RobustScaler {
    fn default() -> Self {
        Self {
            quantile_range: (25.0, 75.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedRobustScaler {
    columns: Vec<String>,
    center: Vec<f64>,
    scale: Vec<f64>,
}

impl FittedRobustScaler {
    pub fn center(&self) -> &[f64] {
        &self.center
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}

impl Fit for RobustScaler {
    type Fitted = FittedRobustScaler;

    fn fit(&self, train: &FeatureMatrix) -> Result<FittedRobustScaler, MlError> {
        let (q_lo, q_hi) = self.quantile_range;
        if !(0.0..=100.0).contains(&q_lo) || !(0.0..=100.0).contains(&q_hi) || q_lo > q_hi {
            return Err(MlError::config(format!(
                "invalid quantile range ({q_lo}, {q_hi})"
            )));
        }

        let mut center = Vec::with_capacity(train.n_cols());
        let mut scale = Vec::with_capacity(train.n_cols());
        for (name, column) in train.columns().iter().zip(train.values().columns()) {
            let sorted = sorted_finite(column.iter());
            let (Some(median), Some(lo), Some(hi)) = (
                percentile_sorted(&sorted, 50.0),
                percentile_sorted(&sorted, q_lo),
                percentile_sorted(&sorted, q_hi),
            ) else {
                return Err(MlError::insufficient_samples(format!(
                    "column '{name}' has no observed values to scale"
                )));
            };
            let range = hi - lo;
            center.push(median);
            scale.push(if range == 0.0 { 1.0 } else { range });
        }

        tracing::debug!(columns = center.len(), "Fitted robust scaler");
        Ok(FittedRobustScaler {
            columns: train.columns().to_vec(),
            center,
            scale,
        })
    }
}

impl Transform for FittedRobustScaler {
    fn transform(&self, data: &FeatureMatrix) -> Result<FeatureMatrix, MlError> {
        data.ensure_same_layout(&self.columns)?;
        let mut values = data.values().clone();
        for ((mut column, &c), &s) in values
            .columns_mut()
            .into_iter()
            .zip(&self.center)
            .zip(&self.scale)
        {
            column.mapv_inplace(|v| (v - c) / s);
        }
        data.with_values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_centers_and_scales() {
        let train = FeatureMatrix::new(
            vec!["a".into(), "b".into()],
            array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0], [4.0, 7.0], [5.0, 7.0]],
        )
        .unwrap();
        let (fitted, scaled) = RobustScaler::default().fit_transform(&train).unwrap();
        assert_eq!(fitted.center(), &[3.0, 7.0]);
        assert_eq!(fitted.scale(), &[2.0, 1.0]);
        assert_eq!(
            scaled.column("a").unwrap().to_vec(),
            vec![-1.0, -0.5, 0.0, 0.5, 1.0]
        );
        assert!(scaled.column("b").unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_test_partition_uses_train_statistics() {
        let train = FeatureMatrix::new(vec!["a".into()], array![[0.0], [2.0], [4.0]]).unwrap();
        let test = FeatureMatrix::new(vec!["a".into()], array![[6.0]]).unwrap();
        let fitted = RobustScaler::default().fit(&train).unwrap();
        assert_eq!(fitted.transform(&test).unwrap().values(), &array![[2.0]]);
    }

    #[test]
    fn test_rejects_bad_range() {
        let train = FeatureMatrix::new(vec!["a".into()], array![[0.0]]).unwrap();
        let scaler = RobustScaler {
            quantile_range: (80.0, 20.0),
        };
        assert!(scaler.fit(&train).is_err());
    }
}
