//! Random forest of bootstrapped CART trees.

use super::tree::{DecisionTree, TreeParams};
use super::{Classifier, Predict, check_shapes, encode_classes};
use crate::error::MlError;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random forest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForest {
    /// Number of trees in the forest.
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn per split (`None` = square root of the feature count).
    pub max_features: Option<usize>,
    /// Train each tree on a bootstrap sample instead of the full set.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// A fitted random forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestModel {
    classes: Vec<usize>,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForestModel {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the per-tree normalized impurity decreases.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

impl Classifier for RandomForest {
    type Model = RandomForestModel;

    fn fit(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<RandomForestModel, MlError> {
        check_shapes(x, y)?;
        if self.n_estimators == 0 {
            return Err(MlError::config("n_estimators must be at least 1"));
        }
        let (classes, positions) = encode_classes(y);
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let max_features = self
            .max_features
            .unwrap_or_else(|| ((n_features as f64).sqrt() as usize).max(1));

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let seed = self.seed.wrapping_add(i as u64);
                let samples: Vec<usize> = if self.bootstrap {
                    let mut rng = ChaCha8Rng::seed_from_u64(seed);
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let params = TreeParams {
                    max_depth: self.max_depth,
                    min_samples_split: self.min_samples_split,
                    min_samples_leaf: self.min_samples_leaf,
                    max_features: Some(max_features),
                    seed: seed.wrapping_mul(0x9E37_79B9_7F4A_7C15),
                };
                DecisionTree::fit(x, &positions, classes.len(), &samples, params)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut feature_importances = vec![0.0; n_features];
        for tree in &trees {
            for (total, imp) in feature_importances.iter_mut().zip(tree.feature_importances()) {
                *total += imp;
            }
        }
        let sum: f64 = feature_importances.iter().sum();
        if sum > 0.0 {
            feature_importances.iter_mut().for_each(|v| *v /= sum);
        }

        tracing::debug!(
            trees = trees.len(),
            max_features,
            classes = classes.len(),
            "Fitted random forest"
        );
        Ok(RandomForestModel {
            classes,
            trees,
            feature_importances,
        })
    }
}

impl Predict for RandomForestModel {
    fn classes(&self) -> &[usize] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (row, mut out) in x.rows().into_iter().zip(proba.rows_mut()) {
            for tree in &self.trees {
                for (o, p) in out.iter_mut().zip(tree.predict_proba_row(row)) {
                    *o += p;
                }
            }
            out.mapv_inplace(|v| v / self.trees.len() as f64);
        }
        proba
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [0.0, 0.1],
            [0.2, 0.0],
            [0.1, 0.3],
            [0.3, 0.2],
            [5.0, 5.1],
            [5.2, 4.9],
            [4.8, 5.0],
            [5.1, 5.3]
        ];
        let y = array![0, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_forest_separates_blobs() {
        let (x, y) = blobs();
        let forest = RandomForest {
            n_estimators: 25,
            ..Default::default()
        };
        let model = forest.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 25);
        let pred = model.predict(&array![[0.1, 0.1], [5.0, 5.0]]);
        assert_eq!(pred.to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = blobs();
        let model = RandomForest::default().fit(&x, &y).unwrap();
        for row in model.predict_proba(&x).rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        let total: f64 = model.feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = blobs();
        let a = RandomForest::default().fit(&x, &y).unwrap();
        let b = RandomForest::default().fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
    }

    #[test]
    fn test_keeps_original_labels() {
        let (x, _) = blobs();
        let y = array![4, 4, 4, 4, 9, 9, 9, 9];
        let model = RandomForest::default().fit(&x, &y).unwrap();
        assert_eq!(model.classes(), &[4, 9]);
        assert_eq!(model.predict(&array![[5.0, 5.0]]).to_vec(), vec![9]);
    }
}
