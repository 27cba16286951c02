use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info};

use super::topology::{EdgeKey, NodeId, Topology};

const DISTANCE_RANGE: (u32, u32) = (10, 100);
const TRAFFIC_RANGE: (u32, u32) = (0, 100);
const QUALITY_RANGE: (u8, u8) = (1, 10);
const BLOCKED_PROBABILITY: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMetrics {
    pub distance: u32,
    pub traffic: u32,
    pub quality: u8,
    pub blocked: bool,
}

impl EdgeMetrics {
    pub fn open(distance: u32, traffic: u32, quality: u8) -> Self {
        Self {
            distance,
            traffic,
            quality,
            blocked: false,
        }
    }

    pub fn blocked(self) -> Self {
        Self {
            blocked: true,
            ..self
        }
    }

    fn draw<R: Rng>(rng: &mut R) -> Self {
        Self {
            distance: rng.gen_range(DISTANCE_RANGE.0..=DISTANCE_RANGE.1),
            traffic: rng.gen_range(TRAFFIC_RANGE.0..=TRAFFIC_RANGE.1),
            quality: rng.gen_range(QUALITY_RANGE.0..=QUALITY_RANGE.1),
            blocked: rng.gen_bool(BLOCKED_PROBABILITY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("edge {0} is not a declared connection")]
    EdgeNotFound(EdgeKey),
}

/// One complete generation of edge metrics. Never mutated once installed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkSnapshot {
    generation: u64,
    edges: BTreeMap<EdgeKey, EdgeMetrics>,
}

impl NetworkSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate<R: Rng>(topology: &Topology, rng: &mut R, generation: u64) -> Self {
        let mut snapshot = Self {
            generation,
            edges: BTreeMap::new(),
        };
        for (u, v) in topology.connections() {
            snapshot.insert_connection(u.clone(), v.clone(), EdgeMetrics::draw(rng));
        }
        snapshot
    }

    /// Installs `metrics` for both traversal directions of `u`-`v`.
    pub fn insert_connection(&mut self, u: NodeId, v: NodeId, metrics: EdgeMetrics) {
        let key = EdgeKey::new(u, v);
        self.edges.insert(key.reversed(), metrics);
        self.edges.insert(key, metrics);
    }

    pub fn with_connection(mut self, u: &str, v: &str, metrics: EdgeMetrics) -> Self {
        self.insert_connection(NodeId::from(u), NodeId::from(v), metrics);
        self
    }

    pub fn metrics_for(&self, u: &NodeId, v: &NodeId) -> Result<EdgeMetrics, NetworkError> {
        let key = EdgeKey::new(u.clone(), v.clone());
        match self.edges.get(&key) {
            Some(metrics) => Ok(*metrics),
            None => Err(NetworkError::EdgeNotFound(key)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EdgeKey, &EdgeMetrics)> {
        self.edges.iter()
    }

    pub fn blocked_count(&self) -> usize {
        self.edges.values().filter(|metrics| metrics.blocked).count() / 2
    }
}

impl Serialize for NetworkSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.edges.len()))?;
        for (key, metrics) in &self.edges {
            map.serialize_entry(&key.to_string(), metrics)?;
        }
        map.end()
    }
}

/// Current edge metrics for a fixed topology.
///
/// Readers take an `Arc` of the whole snapshot; `randomize` builds a fresh
/// snapshot off to the side and swaps it in, so a reader never sees a mix of
/// two generations.
#[derive(Debug)]
pub struct NetworkState {
    topology: Arc<Topology>,
    current: RwLock<Arc<NetworkSnapshot>>,
    rng: Mutex<StdRng>,
}

impl NetworkState {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self::with_rng(topology, StdRng::from_entropy())
    }

    pub fn with_seed(topology: Arc<Topology>, seed: u64) -> Self {
        Self::with_rng(topology, StdRng::seed_from_u64(seed))
    }

    fn with_rng(topology: Arc<Topology>, mut rng: StdRng) -> Self {
        let initial = NetworkSnapshot::generate(&topology, &mut rng, 0);
        Self {
            topology,
            current: RwLock::new(Arc::new(initial)),
            rng: Mutex::new(rng),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn randomize(&self) {
        // Numbering and publishing stay under the rng lock so concurrent
        // calls produce consecutive generations.
        let (generation, blocked) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let generation = self.snapshot().generation() + 1;
            let next = NetworkSnapshot::generate(&self.topology, &mut *rng, generation);
            let blocked = next.blocked_count();
            self.install(next);
            (generation, blocked)
        };
        info!(
            "network environment randomized: generation={} blocked_connections={}",
            generation, blocked
        );
    }

    /// Replaces the current snapshot wholesale.
    pub fn install(&self, snapshot: NetworkSnapshot) {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
        debug!("network snapshot installed: generation={}", guard.generation());
    }

    pub fn snapshot(&self) -> Arc<NetworkSnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn metrics_for(&self, u: &NodeId, v: &NodeId) -> Result<EdgeMetrics, NetworkError> {
        self.snapshot().metrics_for(u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: &str) -> NodeId {
        NodeId::from(id)
    }

    #[test]
    fn randomize_covers_both_directions_with_shared_metrics() {
        let topology = Arc::new(Topology::default_mesh());
        let state = NetworkState::with_seed(Arc::clone(&topology), 7);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.iter().count(), topology.connections().len() * 2);
        for (u, v) in topology.connections() {
            let forward = snapshot.metrics_for(u, v).expect("forward edge");
            let backward = snapshot.metrics_for(v, u).expect("backward edge");
            assert_eq!(forward, backward);
        }
    }

    #[test]
    fn randomized_metrics_stay_in_range() {
        let topology = Arc::new(Topology::default_mesh());
        let state = NetworkState::with_seed(topology, 11);
        for _ in 0..50 {
            state.randomize();
            for (_, metrics) in state.snapshot().iter() {
                assert!((10..=100).contains(&metrics.distance));
                assert!(metrics.traffic <= 100);
                assert!((1..=10).contains(&metrics.quality));
            }
        }
    }

    #[test]
    fn blocked_edges_appear_at_roughly_ten_percent() {
        let topology = Arc::new(Topology::default_mesh());
        let state = NetworkState::with_seed(topology, 3);
        let mut blocked = 0;
        let rounds = 2_000;
        for _ in 0..rounds {
            state.randomize();
            blocked += state.snapshot().blocked_count();
        }
        let ratio = blocked as f64 / (rounds * 9) as f64;
        assert!((0.07..0.13).contains(&ratio), "ratio={ratio}");
    }

    #[test]
    fn unknown_pair_is_edge_not_found() {
        let state = NetworkState::with_seed(Arc::new(Topology::default_mesh()), 1);
        let err = state.metrics_for(&n("A"), &n("E")).expect_err("A-E is absent");
        assert_eq!(err, NetworkError::EdgeNotFound(EdgeKey::new(n("A"), n("E"))));
    }

    #[test]
    fn held_snapshot_survives_randomize() {
        let state = NetworkState::with_seed(Arc::new(Topology::default_mesh()), 5);
        let before = state.snapshot();
        let copy = (*before).clone();
        state.randomize();
        assert_eq!(*before, copy);
        assert_eq!(state.snapshot().generation(), before.generation() + 1);
    }

    #[test]
    fn concurrent_randomize_numbers_every_generation() {
        let state = NetworkState::with_seed(Arc::new(Topology::default_mesh()), 13);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        state.randomize();
                    }
                });
            }
        });
        assert_eq!(state.snapshot().generation(), 100);
    }

    #[test]
    fn snapshot_serializes_with_pair_keys() {
        let snapshot =
            NetworkSnapshot::new().with_connection("A", "B", EdgeMetrics::open(50, 20, 8));
        let value = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(value["A-B"]["distance"], 50);
        assert_eq!(value["B-A"]["blocked"], false);
    }
}
