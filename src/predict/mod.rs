mod forest;
mod linear;
mod registry;
pub mod train;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::EdgeMetrics;

pub use forest::{ForestModel, RegressionTree, TreeNode};
pub use linear::LinearModel;
pub use registry::{read_json, write_json, ModelArtifacts, ModelRegistry, ModelStatus};

pub const FEATURE_NAMES: [&str; 3] = ["distance", "traffic", "quality_inv"];

/// Feature vector handed to a predictor; built per edge and then dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostQuery {
    pub distance: f64,
    pub traffic: f64,
    pub quality_inverse: f64,
}

impl CostQuery {
    pub fn from_metrics(metrics: &EdgeMetrics) -> Self {
        Self {
            distance: f64::from(metrics.distance),
            traffic: f64::from(metrics.traffic),
            quality_inverse: 11.0 - f64::from(metrics.quality),
        }
    }

    pub fn features(&self) -> [f64; 3] {
        [self.distance, self.traffic, self.quality_inverse]
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    #[error("model variant '{0}' is not loaded")]
    ModelUnavailable(ModelVariant),

    #[error("model produced a non-finite cost: {0}")]
    NonFinite(f64),

    #[error("malformed model: {0}")]
    MalformedModel(String),
}

/// A trained regressor mapping edge features to traversal cost.
///
/// Implementations must be deterministic and are shared read-only across
/// searches once loaded.
pub trait CostPredictor: Send + Sync {
    fn predict(&self, query: &CostQuery) -> Result<f64, PredictError>;
}

impl<F> CostPredictor for F
where
    F: Fn(&CostQuery) -> f64 + Send + Sync,
{
    fn predict(&self, query: &CostQuery) -> Result<f64, PredictError> {
        let value = self(query);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PredictError::NonFinite(value))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    Linear,
    #[serde(rename = "rf", alias = "forest")]
    Forest,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Linear, ModelVariant::Forest];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Linear => "linear",
            ModelVariant::Forest => "rf",
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model variant '{0}' (expected 'linear' or 'rf')")]
pub struct UnknownModelVariant(pub String);

impl FromStr for ModelVariant {
    type Err = UnknownModelVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" | "lr" => Ok(ModelVariant::Linear),
            "rf" | "forest" | "random_forest" => Ok(ModelVariant::Forest),
            _ => Err(UnknownModelVariant(s.to_string())),
        }
    }
}
