//! Exhaustive grid search over boosting hyperparameters.

use super::cross_validation::{CrossValidationResult, StratifiedKFold, cross_val_f1_macro};
use crate::error::MlError;
use crate::models::{Classifier, GradientBoostedModel, GradientBoosting};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Candidate values for each searched hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingGrid {
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
    pub n_estimators: Vec<usize>,
}

impl Default for BoostingGrid {
    fn default() -> Self {
        Self {
            learning_rate: vec![0.01, 0.1, 0.2],
            max_depth: vec![3, 5, 7],
            n_estimators: vec![50, 100, 200],
        }
    }
}

impl BoostingGrid {
    pub fn len(&self) -> usize {
        self.learning_rate.len() * self.max_depth.len() * self.n_estimators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination applied to `base`; the last parameter varies fastest.
    pub fn candidates(&self, base: &GradientBoosting) -> Vec<GradientBoosting> {
        let mut configs = Vec::with_capacity(self.len());
        for &learning_rate in &self.learning_rate {
            for &max_depth in &self.max_depth {
                for &n_estimators in &self.n_estimators {
                    configs.push(GradientBoosting {
                        learning_rate,
                        max_depth,
                        n_estimators,
                        ..base.clone()
                    });
                }
            }
        }
        configs
    }
}

/// A single sweep trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepTrial {
    pub trial_number: usize,
    pub params: GradientBoosting,
    pub cv: CrossValidationResult,
}

/// Outcome of a grid search, including the model refit on all data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub trials: Vec<SweepTrial>,
    pub best_trial: usize,
    pub best_model: GradientBoostedModel,
}

impl GridSearchResult {
    pub fn best(&self) -> &SweepTrial {
        &self.trials[self.best_trial]
    }
}

/// Grid search scored by stratified k-fold macro F1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearch {
    pub base: GradientBoosting,
    pub grid: BoostingGrid,
    pub cv: StratifiedKFold,
}

impl GridSearch {
    pub fn new(base: GradientBoosting, grid: BoostingGrid, cv_folds: usize) -> Self {
        Self {
            base,
            grid,
            cv: StratifiedKFold::new(cv_folds),
        }
    }

    /// Evaluate every candidate, pick the best mean score (first one wins
    /// ties) and refit it on the full data.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<GridSearchResult, MlError> {
        if self.grid.is_empty() {
            return Err(MlError::config("boosting grid has no candidates"));
        }
        let folds = self.cv.split(y)?;
        let candidates = self.grid.candidates(&self.base);
        tracing::info!(
            candidates = candidates.len(),
            folds = folds.len(),
            fits = candidates.len() * folds.len(),
            "Starting grid search"
        );

        let trials = candidates
            .into_par_iter()
            .enumerate()
            .map(|(trial_number, params)| {
                let cv = cross_val_f1_macro(&params, x, y, &folds)?;
                tracing::debug!(
                    trial_number,
                    learning_rate = params.learning_rate,
                    max_depth = params.max_depth,
                    n_estimators = params.n_estimators,
                    score = cv.mean_score,
                    "Grid candidate scored"
                );
                Ok(SweepTrial {
                    trial_number,
                    params,
                    cv,
                })
            })
            .collect::<Result<Vec<_>, MlError>>()?;

        let mut best_trial = 0;
        for (i, trial) in trials.iter().enumerate() {
            if trial.cv.mean_score > trials[best_trial].cv.mean_score {
                best_trial = i;
            }
        }
        let best = &trials[best_trial];
        tracing::info!(
            learning_rate = best.params.learning_rate,
            max_depth = best.params.max_depth,
            n_estimators = best.params.n_estimators,
            score = best.cv.mean_score,
            "Best boosting parameters"
        );

        let best_model = best.params.fit(x, y)?;
        Ok(GridSearchResult {
            trials,
            best_trial,
            best_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_candidate_order() {
        let grid = BoostingGrid::default();
        let candidates = grid.candidates(&GradientBoosting::default());
        assert_eq!(candidates.len(), 27);
        assert_eq!(
            (candidates[0].learning_rate, candidates[0].max_depth, candidates[0].n_estimators),
            (0.01, 3, 50)
        );
        assert_eq!(
            (candidates[1].learning_rate, candidates[1].max_depth, candidates[1].n_estimators),
            (0.01, 3, 100)
        );
        assert_eq!(candidates[3].max_depth, 5);
        assert_eq!(candidates[9].learning_rate, 0.1);
        assert_eq!(candidates[26].n_estimators, 200);
        assert!(candidates.iter().all(|c| c.reg_lambda == 1.0));
    }

    #[test]
    fn test_grid_search_picks_and_refits() {
        let x = array![
            [0.0], [0.1], [0.2], [0.3], [0.4], [0.5],
            [5.0], [5.1], [5.2], [5.3], [5.4], [5.5]
        ];
        let y = array![0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1];
        let grid = BoostingGrid {
            learning_rate: vec![0.001, 0.5],
            max_depth: vec![2],
            n_estimators: vec![5],
        };
        let base = GradientBoosting {
            min_child_weight: 0.0,
            ..Default::default()
        };
        let result = GridSearch::new(base, grid, 3).fit(&x, &y).unwrap();
        assert_eq!(result.trials.len(), 2);
        assert_eq!(result.trials[0].trial_number, 0);
        assert!((result.best().cv.mean_score - 1.0).abs() < 1e-12);
        // Both candidates separate the data perfectly; the first wins the tie.
        assert_eq!(result.best_trial, 0);
        assert_eq!(result.best_model.n_trees(), 5);
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        let grid = BoostingGrid {
            learning_rate: vec![],
            ..Default::default()
        };
        let search = GridSearch::new(GradientBoosting::default(), grid, 3);
        assert!(search.fit(&array![[0.0], [1.0], [2.0]], &array![0, 1, 0]).is_err());
    }
}
