use tracing::{debug, error};

use crate::model::{NetworkSnapshot, NodeId};
use crate::predict::{CostQuery, ModelRegistry, ModelVariant, PredictError};

pub const COST_DECIMALS: i32 = 2;

pub fn round_cost(value: f64) -> f64 {
    let scale = 10_f64.powi(COST_DECIMALS);
    (value * scale).round() / scale
}

/// Edge-weight oracle over one network snapshot.
///
/// Every failure mode (absent edge, blockage, missing model, bad prediction)
/// collapses to `f64::INFINITY`; nothing is propagated to the search.
#[derive(Debug, Clone, Copy)]
pub struct EdgeCostResolver<'a> {
    snapshot: &'a NetworkSnapshot,
    models: &'a ModelRegistry,
}

impl<'a> EdgeCostResolver<'a> {
    pub fn new(snapshot: &'a NetworkSnapshot, models: &'a ModelRegistry) -> Self {
        Self { snapshot, models }
    }

    pub fn cost(&self, u: &NodeId, v: &NodeId, variant: ModelVariant) -> f64 {
        let metrics = match self.snapshot.metrics_for(u, v) {
            Ok(metrics) => metrics,
            Err(err) => {
                debug!("{err}");
                return f64::INFINITY;
            }
        };
        if metrics.blocked {
            return f64::INFINITY;
        }

        let query = CostQuery::from_metrics(&metrics);
        let predicted = self
            .models
            .get(variant)
            .and_then(|predictor| predictor.predict(&query));
        match predicted {
            Ok(value) if value.is_finite() => round_cost(value.max(0.0)),
            Ok(value) => {
                error!("prediction for {u}->{v} is not finite: {value}");
                f64::INFINITY
            }
            Err(err @ PredictError::ModelUnavailable(_)) => {
                error!("cannot price {u}->{v}: {err}");
                f64::INFINITY
            }
            Err(err) => {
                error!("prediction failed for {u}->{v}: {err}");
                f64::INFINITY
            }
        }
    }
}
