//! Preprocessing stages: encode, split, impute, fix anomalies, scale, resample.
//!
//! Every stage follows the same two-step shape: learn parameters from the
//! training partition, then apply those parameters to any partition. Fitting
//! returns a new value and never mutates the input.

pub mod anomaly;
pub mod encode;
pub mod impute;
pub mod resample;
pub mod scale;
pub mod split;
pub mod stats;

pub use anomaly::{AnomalyFixer, AnomalyRule, FittedAnomalyFixer};
pub use encode::{FeatureEncoder, FittedEncoder, OrdinalMap};
pub use impute::{FittedImputer, MedianImputer};
pub use resample::{Resample, Smote};
pub use scale::{FittedRobustScaler, RobustScaler};
pub use split::{SplitIndices, train_test_split};

use crate::data::FeatureMatrix;
use crate::error::MlError;

/// Learns parameters from a training matrix.
pub trait Fit {
    type Fitted: Transform;

    fn fit(&self, train: &FeatureMatrix) -> Result<Self::Fitted, MlError>;

    /// Fit on `train` and return both the fitted state and the transformed train matrix.
    fn fit_transform(&self, train: &FeatureMatrix) -> Result<(Self::Fitted, FeatureMatrix), MlError> {
        let fitted = self.fit(train)?;
        let transformed = fitted.transform(train)?;
        Ok((fitted, transformed))
    }
}

/// Applies learned parameters to a matrix with the fitted column layout.
pub trait Transform {
    fn transform(&self, data: &FeatureMatrix) -> Result<FeatureMatrix, MlError>;
}
