//! End-to-end training pipeline for loan-default classification.
//!
//! Stages run in a fixed order and pass immutable values forward:
//! split raw rows, encode, impute, fix anomalies, scale, resample, then fit
//! and evaluate each classifier. Every transformer is fit on the training
//! partition only and applied unchanged to the test partition.

use crate::config::MlConfig;
use crate::data::schema::validate_required_columns;
use crate::data::validate::validate_table;
use crate::data::{ClassDistribution, DataQualityReport, FeatureMatrix, RawTable};
use crate::error::MlError;
use crate::models::{
    Classifier, GradientBoostedModel, GradientBoosting, Predict, RandomForestModel,
};
use crate::preprocessing::{
    FeatureEncoder, Fit, FittedAnomalyFixer, FittedEncoder, FittedImputer, FittedRobustScaler,
    MedianImputer, Resample, SplitIndices, Transform, train_test_split,
};
use crate::training::metrics::label_union;
use crate::training::{ClassificationReport, GridSearch, SweepTrial};
use ndarray::Array1;
use serde::Serialize;

/// Both partitions after preprocessing, with the transformers that produced them.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub split: SplitIndices,
    pub encoder: FittedEncoder,
    pub imputer: FittedImputer,
    pub anomaly_fixer: FittedAnomalyFixer,
    pub scaler: FittedRobustScaler,
    pub x_train: FeatureMatrix,
    pub y_train: Array1<usize>,
    pub x_test: FeatureMatrix,
    pub y_test: Array1<usize>,
    /// Out-of-range cells replaced per rule, (column, train, test).
    pub anomalies: Vec<AnomalyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyCount {
    pub column: String,
    pub train: usize,
    pub test: usize,
}

/// A rebalanced test partition. Reported, never evaluated on.
#[derive(Debug, Clone)]
pub struct ResampledTest {
    pub x: FeatureMatrix,
    pub y: Array1<usize>,
    pub distribution: ClassDistribution,
}

/// Training partition after oversampling.
#[derive(Debug, Clone)]
pub struct ResampledData {
    pub x_train: FeatureMatrix,
    pub y_train: Array1<usize>,
    pub before: ClassDistribution,
    pub after: ClassDistribution,
    pub test: Option<ResampledTest>,
}

/// Test-set evaluation of the random forest.
#[derive(Debug, Clone, Serialize)]
pub struct ModelEvaluation {
    pub model_name: String,
    #[serde(skip)]
    pub model: RandomForestModel,
    pub report: ClassificationReport,
    /// Feature name and importance, most important first.
    pub feature_importances: Vec<(String, f64)>,
}

/// Grid search outcome and test-set evaluation of the refit best candidate.
#[derive(Debug, Clone, Serialize)]
pub struct GridSearchEvaluation {
    pub model_name: String,
    pub best_params: GradientBoosting,
    pub best_cv_score: f64,
    pub trials: Vec<SweepTrial>,
    #[serde(skip)]
    pub model: GradientBoostedModel,
    pub report: ClassificationReport,
    pub loss_history: Vec<f64>,
}

/// Everything a full run produces.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub quality: DataQualityReport,
    pub features: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub anomalies: Vec<AnomalyCount>,
    pub class_distribution_before: ClassDistribution,
    pub class_distribution_after: ClassDistribution,
    pub resampled_test_distribution: Option<ClassDistribution>,
    pub random_forest: Option<ModelEvaluation>,
    pub boosting: Option<GridSearchEvaluation>,
}

/// Orchestrates preprocessing, resampling, training and evaluation.
#[derive(Debug, Clone)]
pub struct LoanModelTrainer {
    config: MlConfig,
    train_forest: bool,
    train_boosting: bool,
}

impl LoanModelTrainer {
    pub fn new(config: MlConfig) -> Self {
        Self {
            config,
            train_forest: true,
            train_boosting: true,
        }
    }

    /// Choose which models [`LoanModelTrainer::train_all_models`] fits.
    pub fn with_models(mut self, forest: bool, boosting: bool) -> Self {
        self.train_forest = forest;
        self.train_boosting = boosting;
        self
    }

    pub fn config(&self) -> &MlConfig {
        &self.config
    }

    fn encoder(&self) -> FeatureEncoder {
        FeatureEncoder::loan_default(&self.config.data.label_column)
    }

    /// Quality report for a raw table against the configured rules.
    pub fn inspect(&self, table: &RawTable) -> DataQualityReport {
        let encoder = self.encoder();
        validate_table(
            table,
            &self.config.data.label_column,
            &encoder.ordinal,
            &self.config.anomaly.rules,
            self.config.data.quality_gate_threshold,
        )
    }

    /// Split, encode, impute, fix anomalies and scale.
    pub fn preprocess(&self, table: &RawTable) -> Result<PreparedData, MlError> {
        validate_required_columns(table, &self.config.data.label_column)?;
        let split = train_test_split(
            table.row_count(),
            self.config.split.test_size,
            self.config.split.seed,
        )?;
        let train_raw = table.select_rows(&split.train);
        let test_raw = table.select_rows(&split.test);
        tracing::info!(
            train = train_raw.row_count(),
            test = test_raw.row_count(),
            "Split dataset"
        );

        let encoder = self.encoder().fit(&train_raw)?;
        let x_train = encoder.transform(&train_raw)?;
        let x_test = encoder.transform(&test_raw)?;
        let y_train = encoder.labels(&train_raw)?;
        let y_test = encoder.labels(&test_raw)?;
        tracing::info!(
            features = x_train.n_cols(),
            missing_train = x_train.count_missing(),
            missing_test = x_test.count_missing(),
            "Encoded features"
        );

        let (imputer, x_train) = MedianImputer.fit_transform(&x_train)?;
        let x_test = imputer.transform(&x_test)?;

        let anomaly_fixer = self.config.anomaly.fit(&x_train)?;
        let anomalies = anomaly_fixer
            .count_anomalies(&x_train)
            .into_iter()
            .zip(anomaly_fixer.count_anomalies(&x_test))
            .map(|((column, train), (_, test))| AnomalyCount {
                column,
                train,
                test,
            })
            .collect();
        let x_train = anomaly_fixer.transform(&x_train)?;
        let x_test = anomaly_fixer.transform(&x_test)?;

        let (scaler, x_train) = self.config.scaling.fit_transform(&x_train)?;
        let x_test = scaler.transform(&x_test)?;
        tracing::info!(rows = x_train.n_rows(), columns = x_train.n_cols(), "Preprocessing complete");

        Ok(PreparedData {
            split,
            encoder,
            imputer,
            anomaly_fixer,
            scaler,
            x_train,
            y_train,
            x_test,
            y_test,
            anomalies,
        })
    }

    /// Oversample minority classes in the training partition.
    pub fn apply_smote(&self, prepared: &PreparedData) -> Result<ResampledData, MlError> {
        let smote = self.config.resample.smote();
        let before = ClassDistribution::from_labels(&prepared.y_train);
        let (x_train, y_train) = smote.fit_resample(&prepared.x_train, &prepared.y_train)?;
        let after = ClassDistribution::from_labels(&y_train);
        tracing::info!(before = ?before.0, after = ?after.0, "Resampled training set");

        let test = if self.config.resample.apply_to_test {
            let (x, y) = smote.fit_resample(&prepared.x_test, &prepared.y_test)?;
            let distribution = ClassDistribution::from_labels(&y);
            tracing::info!(after = ?distribution.0, "Resampled test set (not used for evaluation)");
            Some(ResampledTest { x, y, distribution })
        } else {
            None
        };

        Ok(ResampledData {
            x_train,
            y_train,
            before,
            after,
            test,
        })
    }

    fn report<M: Predict>(
        model: &M,
        resampled: &ResampledData,
        prepared: &PreparedData,
    ) -> Result<ClassificationReport, MlError> {
        let y_pred = model.predict(prepared.x_test.values());
        let labels = label_union([&resampled.y_train, &prepared.y_test, &y_pred]);
        ClassificationReport::new(&prepared.y_test, &y_pred, &labels)
    }

    /// Fit the random forest on resampled data and evaluate on the test partition.
    pub fn train_random_forest(
        &self,
        resampled: &ResampledData,
        prepared: &PreparedData,
    ) -> Result<ModelEvaluation, MlError> {
        tracing::info!(trees = self.config.forest.n_estimators, "Training random forest");
        let model = self
            .config
            .forest
            .fit(resampled.x_train.values(), &resampled.y_train)?;
        let report = Self::report(&model, resampled, prepared)?;

        let mut feature_importances: Vec<(String, f64)> = resampled
            .x_train
            .columns()
            .iter()
            .cloned()
            .zip(model.feature_importances().iter().copied())
            .collect();
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

        tracing::info!(
            accuracy = report.accuracy,
            f1_macro = report.macro_avg.f1_score,
            "Random forest evaluated"
        );
        Ok(ModelEvaluation {
            model_name: "Random Forest".to_string(),
            model,
            report,
            feature_importances,
        })
    }

    /// Grid-search boosting hyperparameters, refit the best and evaluate on the test partition.
    pub fn train_boosting_with_grid_search(
        &self,
        resampled: &ResampledData,
        prepared: &PreparedData,
    ) -> Result<GridSearchEvaluation, MlError> {
        let boosting = &self.config.boosting;
        let search = GridSearch::new(boosting.base.clone(), boosting.grid.clone(), boosting.cv_folds);
        let result = search.fit(resampled.x_train.values(), &resampled.y_train)?;
        let report = Self::report(&result.best_model, resampled, prepared)?;
        let best = result.best().clone();

        tracing::info!(
            accuracy = report.accuracy,
            f1_macro = report.macro_avg.f1_score,
            "Gradient boosting evaluated"
        );
        Ok(GridSearchEvaluation {
            model_name: "Gradient Boosting".to_string(),
            best_params: best.params,
            best_cv_score: best.cv.mean_score,
            loss_history: result.best_model.history().loss_history.clone(),
            trials: result.trials,
            model: result.best_model,
            report,
        })
    }

    /// Run every stage in order.
    pub fn train_all_models(&self, table: &RawTable) -> Result<TrainingSummary, MlError> {
        let quality = self.inspect(table);
        if quality.passed_gate {
            tracing::info!(score = quality.overall_score, "Data quality gate passed");
        } else {
            tracing::warn!(
                score = quality.overall_score,
                threshold = self.config.data.quality_gate_threshold,
                "Data quality gate failed; continuing"
            );
        }

        let prepared = self.preprocess(table)?;
        let resampled = self.apply_smote(&prepared)?;

        let random_forest = if self.train_forest {
            Some(self.train_random_forest(&resampled, &prepared)?)
        } else {
            None
        };
        let boosting = if self.train_boosting {
            Some(self.train_boosting_with_grid_search(&resampled, &prepared)?)
        } else {
            None
        };

        Ok(TrainingSummary {
            quality,
            features: prepared.x_train.columns().to_vec(),
            train_rows: prepared.x_train.n_rows(),
            test_rows: prepared.x_test.n_rows(),
            anomalies: prepared.anomalies,
            class_distribution_before: resampled.before,
            class_distribution_after: resampled.after,
            resampled_test_distribution: resampled.test.map(|t| t.distribution),
            random_forest,
            boosting,
        })
    }
}
