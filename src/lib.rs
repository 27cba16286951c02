//! Mesh routing agent whose edge weights come from trained cost predictors.
//!
//! The [`agent::RoutingAgent`] owns a randomized [`model::NetworkState`] and
//! answers shortest-path queries through [`routing::RouteSearch`], asking the
//! [`routing::EdgeCostResolver`] for each edge weight only when the search
//! reaches it.

pub mod agent;
pub mod model;
pub mod predict;
pub mod routing;
pub mod runtime;

pub use agent::RoutingAgent;
pub use model::{EdgeMetrics, NetworkSnapshot, NetworkState, NodeId, Topology};
pub use predict::{CostPredictor, CostQuery, ModelRegistry, ModelVariant, PredictError};
pub use routing::{DecisionTrace, PathResult, RouteError, RouteOutcome};
