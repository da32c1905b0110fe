//! Stratified k-fold cross-validation.

use super::metrics::f1_macro;
use crate::error::MlError;
use crate::models::{Classifier, Predict};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation split.
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Unshuffled stratified k-fold splitter.
///
/// Classes are numbered by first appearance. Their codes are sorted and dealt round-robin to decide how many members of
/// each class every fold receives; each class then fills the folds in row
/// order, so fold sizes differ by at most one within a class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_folds: usize,
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self { n_folds: 3 }
    }
}

impl StratifiedKFold {
    pub fn new(n_folds: usize) -> Self {
        Self { n_folds }
    }

    pub fn split(&self, y: &Array1<usize>) -> Result<Vec<CVSplit>, MlError> {
        let k = self.n_folds;
        if k < 2 {
            return Err(MlError::config(format!("cv_folds must be at least 2, got {k}")));
        }
        if y.len() < k {
            return Err(MlError::insufficient_samples(format!(
                "cannot split {} samples into {k} folds",
                y.len()
            )));
        }

        let mut codes: BTreeMap<usize, usize> = BTreeMap::new();
        for label in y {
            let next = codes.len();
            codes.entry(*label).or_insert(next);
        }
        let n_classes = codes.len();
        let class_pos = |label: &usize| codes.get(label).copied().unwrap_or_default();

        let mut counts = vec![0usize; n_classes];
        for label in y {
            counts[class_pos(label)] += 1;
        }
        if counts.iter().all(|&c| c < k) {
            return Err(MlError::insufficient_samples(format!(
                "{k} folds need at least {k} members in some class, counts are {counts:?}"
            )));
        }
        if let Some(min) = counts.iter().min().filter(|&&m| m < k) {
            tracing::warn!(
                least_populated = min,
                folds = k,
                "Least populated class has fewer members than folds"
            );
        }

        // allocation[fold][class]: members of `class` among sorted codes fold, fold+k, ...
        let mut sorted: Vec<usize> = y.iter().map(class_pos).collect();
        sorted.sort_unstable();
        let mut allocation = vec![vec![0usize; n_classes]; k];
        for (i, c) in sorted.iter().enumerate() {
            allocation[i % k][*c] += 1;
        }

        let mut fold_of = vec![0usize; y.len()];
        let mut next = vec![(0usize, 0usize); n_classes]; // (fold, filled)
        for (row, label) in y.iter().enumerate() {
            let c = class_pos(label);
            let (fold, filled) = &mut next[c];
            while *filled >= allocation[*fold][c] {
                *fold += 1;
                *filled = 0;
            }
            fold_of[row] = *fold;
            *filled += 1;
        }

        Ok((0..k)
            .map(|fold| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&row| fold_of[row] == fold);
                CVSplit {
                    train_indices,
                    test_indices,
                }
            })
            .collect())
    }
}

/// Cross-validation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub metric_name: String,
}

impl CrossValidationResult {
    pub fn from_scores(scores: Vec<f64>, metric_name: &str) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            fold_scores: scores,
            mean_score: mean,
            std_score: variance.sqrt(),
            metric_name: metric_name.to_string(),
        }
    }
}

/// Fit on each training fold and score macro F1 on the held-out fold.
pub fn cross_val_f1_macro<C: Classifier>(
    classifier: &C,
    x: &Array2<f64>,
    y: &Array1<usize>,
    folds: &[CVSplit],
) -> Result<CrossValidationResult, MlError> {
    let scores = folds
        .iter()
        .map(|split| {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);
            let model = classifier.fit(&x_train, &y_train)?;
            f1_macro(&y_test, &model.predict(&x_test))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CrossValidationResult::from_scores(scores, "f1_macro"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RandomForest;
    use ndarray::array;

    #[test]
    fn test_folds_partition_rows() {
        let y = array![0, 0, 0, 0, 0, 0, 1, 1, 1];
        let folds = StratifiedKFold::new(3).split(&y).unwrap();
        assert_eq!(folds.len(), 3);
        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..9).collect::<Vec<_>>());
        for fold in &folds {
            assert_eq!(fold.train_indices.len() + fold.test_indices.len(), 9);
            let positives = fold.test_indices.iter().filter(|&&i| y[i] == 1).count();
            assert_eq!(positives, 1);
            assert_eq!(fold.test_indices.len(), 3);
        }
    }

    #[test]
    fn test_class_members_fill_folds_in_order() {
        let y = array![1, 0, 1, 0, 1, 0];
        let folds = StratifiedKFold::new(3).split(&y).unwrap();
        assert_eq!(folds[0].test_indices, vec![0, 1]);
        assert_eq!(folds[1].test_indices, vec![2, 3]);
        assert_eq!(folds[2].test_indices, vec![4, 5]);
    }

    #[test]
    fn test_uneven_allocation() {
        // Sorted labels 0 0 0 0 1 1 1 dealt to 3 folds: [0 0 1] [0 1] [0 1].
        let y = array![0, 0, 0, 0, 1, 1, 1];
        let folds = StratifiedKFold::new(3).split(&y).unwrap();
        assert_eq!(folds[0].test_indices, vec![0, 1, 4]);
        assert_eq!(folds[1].test_indices, vec![2, 5]);
        assert_eq!(folds[2].test_indices, vec![3, 6]);
    }

    #[test]
    fn test_classes_numbered_by_first_appearance() {
        // Codes: label 1 -> 0, label 0 -> 1. Sorted codes 0 0 1 1 1 1 1 dealt
        // to 3 folds: [0 1 1] [0 1] [1 1].
        let y = array![1, 1, 0, 0, 0, 0, 0];
        let folds = StratifiedKFold::new(3).split(&y).unwrap();
        assert_eq!(folds[0].test_indices, vec![0, 2, 3]);
        assert_eq!(folds[1].test_indices, vec![1, 4]);
        assert_eq!(folds[2].test_indices, vec![5, 6]);
    }

    #[test]
    fn test_rejects_bad_fold_counts() {
        assert!(StratifiedKFold::new(1).split(&array![0, 1]).is_err());
        assert!(StratifiedKFold::new(3).split(&array![0, 1]).is_err());
        assert!(StratifiedKFold::new(3).split(&array![0, 0, 1, 1]).is_err());
    }

    #[test]
    fn test_from_scores() {
        let result = CrossValidationResult::from_scores(vec![0.5, 1.0], "f1_macro");
        assert!((result.mean_score - 0.75).abs() < 1e-12);
        assert!((result.std_score - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_cross_val_scores_separable_data() {
        let x = array![[0.0], [0.1], [0.2], [0.3], [0.4], [0.5], [5.0], [5.1], [5.2], [5.3], [5.4], [5.5]];
        let y = array![0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1];
        let folds = StratifiedKFold::new(3).split(&y).unwrap();
        let forest = RandomForest {
            n_estimators: 10,
            ..Default::default()
        };
        let result = cross_val_f1_macro(&forest, &x, &y, &folds).unwrap();
        assert_eq!(result.fold_scores.len(), 3);
        assert!(result.mean_score > 0.99);
    }
}
