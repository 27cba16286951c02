use std::collections::BTreeMap;

use tracing::debug;

use super::frontier::SearchFrontier;
use super::resolver::{round_cost, EdgeCostResolver};
use super::types::{DecisionTrace, PathResult, RouteError, RouteOutcome};
use crate::model::{EdgeKey, NetworkSnapshot, NodeId, Topology};
use crate::predict::{ModelRegistry, ModelVariant};

/// Dijkstra over the topology with edge weights priced on demand.
///
/// All lookups go through one snapshot, so a concurrent randomize cannot
/// change weights halfway through a search.
pub struct RouteSearch<'a> {
    topology: &'a Topology,
    models: &'a ModelRegistry,
    resolver: EdgeCostResolver<'a>,
}

impl<'a> RouteSearch<'a> {
    pub fn new(
        topology: &'a Topology,
        snapshot: &'a NetworkSnapshot,
        models: &'a ModelRegistry,
    ) -> Self {
        Self {
            topology,
            models,
            resolver: EdgeCostResolver::new(snapshot, models),
        }
    }

    pub fn find(
        &self,
        start: &NodeId,
        dest: &NodeId,
        variant: ModelVariant,
    ) -> Result<RouteOutcome, RouteError> {
        self.check_node("start", start)?;
        self.check_node("destination", dest)?;

        let mut trace = DecisionTrace::new();
        trace.push(format!(
            "Goal: {start} -> {dest} | Strategy: Dijkstra | Model: {}",
            variant.as_str().to_uppercase()
        ));

        if start == dest {
            trace.push("Start equals destination. No movement required.");
            return Ok(RouteOutcome {
                best: Some(PathResult::stay(start.clone())),
                trace,
            });
        }

        if !self.models.is_available(variant) {
            trace.push(format!(
                "Model '{variant}' is not loaded; every edge priced with it is impassable."
            ));
        }

        let mut frontier = SearchFrontier::seeded(start.clone());
        while let Some((u, cost_u)) = frontier.settle_next() {
            if u == *dest {
                break;
            }

            for v in self.topology.neighbors(&u) {
                if frontier.is_settled(v) {
                    continue;
                }

                let edge_cost = self.resolver.cost(&u, v, variant);
                if edge_cost.is_infinite() {
                    trace.push(format!(
                        "Route through {} is non-feasible (blocked or unpriceable).",
                        EdgeKey::new(u.clone(), v.clone())
                    ));
                    continue;
                }

                let candidate = cost_u + edge_cost;
                if frontier.relax(&u, v, candidate) {
                    trace.push(format!(
                        "Path update: {u}->{v} | New cost to {v}: {candidate:.2}"
                    ));
                }
            }
        }

        let total = frontier.best_cost(dest);
        if total.is_infinite() {
            trace.push(format!(
                "No feasible solution found ({dest} is unreachable from {start})."
            ));
            return Ok(RouteOutcome { best: None, trace });
        }

        let path = self.reconstruct(frontier.predecessors(), start, dest)?;
        let best = PathResult {
            path,
            total_cost: round_cost(total),
        };
        debug!(
            "route {start}->{dest} via {variant}: hops={} cost={:.2} settled={}",
            best.hops(),
            best.total_cost,
            frontier.settled_count()
        );
        trace.push(format!(
            "Optimal decision: path {} with total cost {:.2}",
            join_path(&best.path),
            best.total_cost
        ));

        Ok(RouteOutcome {
            best: Some(best),
            trace,
        })
    }

    fn check_node(&self, role: &'static str, node: &NodeId) -> Result<(), RouteError> {
        if self.topology.contains(node) {
            return Ok(());
        }
        Err(RouteError::InvalidNode {
            role,
            node: node.clone(),
            valid: self
                .topology
                .nodes()
                .iter()
                .map(|node| node.to_string())
                .collect(),
        })
    }

    fn reconstruct(
        &self,
        predecessor: &BTreeMap<NodeId, NodeId>,
        start: &NodeId,
        dest: &NodeId,
    ) -> Result<Vec<NodeId>, RouteError> {
        let broken = || RouteError::BrokenPredecessorChain {
            start: start.clone(),
            dest: dest.clone(),
        };

        let mut path = vec![dest.clone()];
        let mut current = dest;
        while let Some(prev) = predecessor.get(current) {
            path.push(prev.clone());
            if path.len() > self.topology.nodes().len() {
                return Err(broken());
            }
            current = prev;
        }
        path.reverse();

        if path.first() != Some(start) {
            return Err(broken());
        }
        Ok(path)
    }
}

fn join_path(path: &[NodeId]) -> String {
    path.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
