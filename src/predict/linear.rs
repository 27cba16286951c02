use serde::{Deserialize, Serialize};

use super::{CostPredictor, CostQuery, PredictError};

/// `cost = w_distance*distance + w_traffic*traffic + w_quality_inv*(11-quality) + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub w_distance: f64,
    pub w_traffic: f64,
    pub w_quality_inv: f64,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearModel {
    pub fn coefficients(&self) -> [f64; 3] {
        [self.w_distance, self.w_traffic, self.w_quality_inv]
    }

    pub fn validate(&self) -> Result<(), PredictError> {
        let all = [
            self.w_distance,
            self.w_traffic,
            self.w_quality_inv,
            self.intercept,
        ];
        if all.iter().all(|value| value.is_finite()) {
            Ok(())
        } else {
            Err(PredictError::MalformedModel(
                "linear coefficients must be finite".to_string(),
            ))
        }
    }
}

impl Default for LinearModel {
    fn default() -> Self {
        Self {
            w_distance: 0.3,
            w_traffic: 0.5,
            w_quality_inv: 0.2,
            intercept: 0.0,
        }
    }
}

impl CostPredictor for LinearModel {
    fn predict(&self, query: &CostQuery) -> Result<f64, PredictError> {
        let value = self
            .coefficients()
            .iter()
            .zip(query.features())
            .map(|(weight, feature)| weight * feature)
            .sum::<f64>()
            + self.intercept;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PredictError::NonFinite(value))
        }
    }
}
