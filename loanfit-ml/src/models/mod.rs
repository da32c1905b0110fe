//! Classifiers: CART trees, random forest, gradient-boosted trees.

pub mod boosting;
pub mod forest;
pub mod tree;

pub use boosting::{GradientBoostedModel, GradientBoosting};
pub use forest::{RandomForest, RandomForestModel};
pub use tree::{DecisionTree, TreeParams};

use crate::error::MlError;
use ndarray::{Array1, Array2, Axis};

/// Estimator configuration that learns a model from labelled data.
pub trait Classifier {
    type Model: Predict;

    fn fit(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<Self::Model, MlError>;
}

/// A fitted classifier.
pub trait Predict {
    /// Class labels in the column order of [`Predict::predict_proba`].
    fn classes(&self) -> &[usize];

    /// Per-class probabilities, one row per sample.
    fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64>;

    /// Most probable class per sample; ties go to the smaller label.
    fn predict(&self, x: &Array2<f64>) -> Array1<usize> {
        let proba = self.predict_proba(x);
        let classes = self.classes();
        proba
            .axis_iter(Axis(0))
            .map(|row| {
                let mut best = 0;
                for (i, p) in row.iter().enumerate() {
                    if *p > row[best] {
                        best = i;
                    }
                }
                classes[best]
            })
            .collect()
    }
}

/// Sorted distinct labels and each sample's position in that list.
pub(crate) fn encode_classes(y: &Array1<usize>) -> (Vec<usize>, Vec<usize>) {
    let mut classes: Vec<usize> = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    let positions = y
        .iter()
        .map(|label| classes.binary_search(label).unwrap_or_default())
        .collect();
    (classes, positions)
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<usize>) -> Result<(), MlError> {
    if x.nrows() != y.len() {
        return Err(MlError::invalid_input(format!(
            "{} rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(MlError::insufficient_samples("training set is empty"));
    }
    Ok(())
}
