use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::model::{NetworkSnapshot, NetworkState, NodeId, Topology};
use crate::predict::{ModelRegistry, ModelVariant};
use crate::routing::{RouteError, RouteOutcome, RouteSearch};
use crate::runtime::config::AppConfig;

/// Entry point for presentation layers: owns the network snapshot and the
/// loaded predictors, and runs searches against them.
#[derive(Debug)]
pub struct RoutingAgent {
    network: NetworkState,
    models: Arc<ModelRegistry>,
}

impl RoutingAgent {
    pub fn new(topology: Topology, models: Arc<ModelRegistry>) -> Self {
        Self {
            network: NetworkState::new(Arc::new(topology)),
            models,
        }
    }

    pub fn with_seed(topology: Topology, models: Arc<ModelRegistry>, seed: u64) -> Self {
        Self {
            network: NetworkState::with_seed(Arc::new(topology), seed),
            models,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let topology = cfg.network.build_topology()?;
        let models = Arc::new(ModelRegistry::load(&cfg.models));
        let agent = match cfg.network.seed {
            Some(seed) => Self::with_seed(topology, models, seed),
            None => Self::new(topology, models),
        };
        info!(
            "routing agent ready: nodes={} connections={} models={:?}",
            agent.topology().nodes().len(),
            agent.topology().connections().len(),
            ModelVariant::ALL
                .iter()
                .filter(|variant| agent.models.is_available(**variant))
                .map(ModelVariant::as_str)
                .collect::<Vec<_>>()
        );
        Ok(agent)
    }

    pub fn randomize_network(&self) {
        self.network.randomize();
    }

    pub fn get_network_state(&self) -> Arc<NetworkSnapshot> {
        self.network.snapshot()
    }

    pub fn install_network(&self, snapshot: NetworkSnapshot) {
        self.network.install(snapshot);
    }

    pub fn find_best_route(
        &self,
        start: &NodeId,
        dest: &NodeId,
        variant: ModelVariant,
    ) -> Result<RouteOutcome, RouteError> {
        let snapshot = self.network.snapshot();
        RouteSearch::new(self.network.topology(), &snapshot, &self.models).find(start, dest, variant)
    }

    pub fn topology(&self) -> &Topology {
        self.network.topology()
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EdgeMetrics;
    use crate::predict::LinearModel;

    fn agent() -> RoutingAgent {
        let models = ModelRegistry::new().with_model(ModelVariant::Linear, LinearModel::default());
        RoutingAgent::with_seed(Topology::default_mesh(), Arc::new(models), 21)
    }

    #[test]
    fn randomize_keeps_topology_fixed() {
        let agent = agent();
        let nodes = agent.topology().nodes().to_vec();
        let connections = agent.topology().connections().to_vec();
        let before = agent.get_network_state();
        for _ in 0..20 {
            agent.randomize_network();
            let snapshot = agent.get_network_state();
            assert_eq!(snapshot.iter().count(), connections.len() * 2);
            for (u, v) in &connections {
                assert!(snapshot.metrics_for(u, v).is_ok());
            }
        }
        assert_eq!(agent.topology().nodes(), nodes.as_slice());
        assert_eq!(agent.topology().connections(), connections.as_slice());
        assert_ne!(agent.get_network_state().generation(), before.generation());
    }

    #[test]
    fn route_reflects_installed_snapshot() {
        let agent = agent();
        let mut snapshot = NetworkSnapshot::new();
        for (u, v) in agent.topology().connections() {
            snapshot.insert_connection(u.clone(), v.clone(), EdgeMetrics::open(10, 10, 5).blocked());
        }
        agent.install_network(snapshot.with_connection("A", "B", EdgeMetrics::open(50, 20, 8)));

        let outcome = agent
            .find_best_route(&NodeId::from("A"), &NodeId::from("B"), ModelVariant::Linear)
            .expect("valid nodes");
        let best = outcome.best.expect("A-B is open");
        assert_eq!(best.total_cost, 25.6);
        assert_eq!(best.path, vec![NodeId::from("A"), NodeId::from("B")]);
    }

    #[test]
    fn invalid_node_is_surfaced() {
        let agent = agent();
        let err = agent
            .find_best_route(&NodeId::from("F"), &NodeId::from("A"), ModelVariant::Linear)
            .expect_err("F is not declared");
        assert!(matches!(err, RouteError::InvalidNode { role: "start", .. }));
    }

    #[test]
    fn search_keeps_its_snapshot_across_randomize() {
        let agent = agent();
        let held = agent.get_network_state();
        agent.randomize_network();
        let search = RouteSearch::new(agent.topology(), &held, agent.models());
        let replay = search
            .find(&NodeId::from("A"), &NodeId::from("E"), ModelVariant::Linear)
            .expect("valid nodes");
        let again = search
            .find(&NodeId::from("A"), &NodeId::from("E"), ModelVariant::Linear)
            .expect("valid nodes");
        assert_eq!(replay, again);
    }
}
