//! Model selection and scoring: loss tracking, classification reports,
//! stratified cross-validation and hyperparameter grid search.

pub mod cross_validation;
pub mod metrics;
pub mod sweep;

pub use cross_validation::{CVSplit, CrossValidationResult, StratifiedKFold, cross_val_f1_macro};
pub use metrics::{ClassificationReport, ConfusionMatrix, TrainingMetrics, f1_macro};
pub use sweep::{BoostingGrid, GridSearch, GridSearchResult, SweepTrial};
