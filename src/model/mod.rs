mod network;
mod topology;

pub use network::{EdgeMetrics, NetworkError, NetworkSnapshot, NetworkState};
pub use topology::{
    EdgeKey, NodeId, Topology, TopologyError, DEFAULT_CONNECTIONS, DEFAULT_NODES,
};
