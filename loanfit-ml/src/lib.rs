//! # loanfit-ml: loan-default classification
//!
//! Reads a loan applicant table, prepares it for learning and trains two
//! classifiers:
//!
//! - **data**: delimited-file ingestion, schema checks, quality reports
//! - **preprocessing**: categorical encoding, train/test split, median
//!   imputation, anomaly clamping, robust scaling, SMOTE oversampling
//! - **models**: CART trees, random forest, gradient-boosted trees
//! - **training**: classification reports, stratified k-fold, grid search
//! - **pipeline**: [`LoanModelTrainer`], which runs the stages in order
//!
//! Every transformer is fit on the training partition and only applied to
//! the test partition.

pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod training;

pub use config::{MlConfig, load_config};
pub use data::{CsvSource, DataSource, RawTable};
pub use error::MlError;
pub use pipeline::{
    GridSearchEvaluation, LoanModelTrainer, ModelEvaluation, PreparedData, ResampledData,
    TrainingSummary,
};
