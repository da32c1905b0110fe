//! Configuration for the loanfit pipeline.
//!
//! Loaded by layering, lowest precedence first: built-in defaults, the user
//! config (`config.toml` in the platform config dir), the workspace
//! `.loanfit/config.toml`, an explicit file, then `LOANFIT_` environment
//! variables with `__` separating nested keys.

use crate::models::{GradientBoosting, RandomForest};
use crate::preprocessing::{AnomalyFixer, RobustScaler, Smote};
use crate::training::BoostingGrid;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MlConfig {
    /// Input parsing and quality gate.
    #[serde(default)]
    pub data: DataConfig,
    /// Train/test partitioning.
    #[serde(default)]
    pub split: SplitConfig,
    /// Upper bounds for implausible values.
    #[serde(default)]
    pub anomaly: AnomalyFixer,
    #[serde(default)]
    pub scaling: RobustScaler,
    /// Minority oversampling.
    #[serde(default)]
    pub resample: ResampleConfig,
    #[serde(default)]
    pub forest: RandomForest,
    /// Gradient boosting and its hyperparameter search.
    #[serde(default)]
    pub boosting: BoostingConfig,
}

/// Input file configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Field delimiter of the input file.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Column holding the class label.
    #[serde(default = "default_label_column")]
    pub label_column: String,
    /// Minimum data quality score before a warning is raised.
    #[serde(default = "default_quality_gate")]
    pub quality_gate_threshold: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            label_column: default_label_column(),
            quality_gate_threshold: default_quality_gate(),
        }
    }
}

fn default_delimiter() -> char {
    ','
}

fn default_label_column() -> String {
    crate::data::schema::LOAN_STATUS.to_string()
}

fn default_quality_gate() -> f64 {
    0.7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Fraction of rows held out for evaluation.
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            seed: default_seed(),
        }
    }
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

/// Oversampling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleConfig {
    #[serde(default = "default_k_neighbors")]
    pub k_neighbors: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Also rebalance the test partition. The result is reported only and
    /// never used for evaluation.
    #[serde(default)]
    pub apply_to_test: bool,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            k_neighbors: default_k_neighbors(),
            seed: default_seed(),
            apply_to_test: false,
        }
    }
}

fn default_k_neighbors() -> usize {
    2
}

impl ResampleConfig {
    pub fn smote(&self) -> Smote {
        Smote {
            k_neighbors: self.k_neighbors,
            seed: self.seed,
        }
    }
}

/// Gradient boosting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Stratified folds used to score each grid candidate.
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    /// Parameters shared by every grid candidate.
    #[serde(default)]
    pub base: GradientBoosting,
    #[serde(default)]
    pub grid: BoostingGrid,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            cv_folds: default_cv_folds(),
            base: GradientBoosting::default(),
            grid: BoostingGrid::default(),
        }
    }
}

fn default_cv_folds() -> usize {
    3
}

/// Per-user configuration file, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "loanfit", "loanfit")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Workspace configuration file location.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".loanfit").join("config.toml")
}

/// Load configuration from defaults, config files and environment.
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<MlConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(MlConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // An explicit file must exist; a missing one is reported, not skipped.
    if let Some(path) = explicit {
        figment = figment.merge(Toml::file_exact(path));
    }

    // LOANFIT_SPLIT__TEST_SIZE, LOANFIT_BOOSTING__CV_FOLDS, etc.
    figment = figment.merge(Env::prefixed("LOANFIT_").split("__"));

    figment.extract().map_err(Box::new)
}
