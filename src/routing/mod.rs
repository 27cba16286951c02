mod frontier;
mod resolver;
mod search;
mod types;

pub use resolver::{round_cost, EdgeCostResolver, COST_DECIMALS};
pub use search::RouteSearch;
pub use types::{DecisionTrace, PathResult, RouteError, RouteOutcome};
