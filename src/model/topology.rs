use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_NODES: [&str; 5] = ["A", "B", "C", "D", "E"];

pub const DEFAULT_CONNECTIONS: [(&str, &str); 9] = [
    ("A", "B"),
    ("A", "C"),
    ("A", "D"),
    ("B", "C"),
    ("B", "D"),
    ("B", "E"),
    ("C", "E"),
    ("D", "E"),
    ("C", "D"),
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Ordered node pair naming one traversal direction of a connection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    pub from: NodeId,
    pub to: NodeId,
}

impl EdgeKey {
    pub fn new(from: NodeId, to: NodeId) -> Self {
        Self { from, to }
    }

    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("topology has no nodes")]
    Empty,

    #[error("duplicate node {0}")]
    DuplicateNode(NodeId),

    #[error("connection {from}-{to} references undeclared node {missing}")]
    UndeclaredNode {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    #[error("connection {0}-{0} is a self-loop")]
    SelfLoop(NodeId),

    #[error("connection {from}-{to} is declared more than once")]
    DuplicateConnection { from: NodeId, to: NodeId },
}

/// Fixed node set plus undirected connections; immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    nodes: Vec<NodeId>,
    node_set: BTreeSet<NodeId>,
    connections: Vec<(NodeId, NodeId)>,
    adjacency: BTreeMap<NodeId, Vec<NodeId>>,
}

impl Topology {
    pub fn new(
        nodes: Vec<NodeId>,
        connections: Vec<(NodeId, NodeId)>,
    ) -> Result<Self, TopologyError> {
        if nodes.is_empty() {
            return Err(TopologyError::Empty);
        }

        let mut node_set = BTreeSet::new();
        for node in &nodes {
            if !node_set.insert(node.clone()) {
                return Err(TopologyError::DuplicateNode(node.clone()));
            }
        }

        let mut seen: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();

        for (u, v) in &connections {
            for endpoint in [u, v] {
                if !node_set.contains(endpoint) {
                    return Err(TopologyError::UndeclaredNode {
                        from: u.clone(),
                        to: v.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            if u == v {
                return Err(TopologyError::SelfLoop(u.clone()));
            }
            let canonical = if u < v {
                (u.clone(), v.clone())
            } else {
                (v.clone(), u.clone())
            };
            if !seen.insert(canonical) {
                return Err(TopologyError::DuplicateConnection {
                    from: u.clone(),
                    to: v.clone(),
                });
            }
        }

        Ok(Self::assemble(nodes, connections))
    }

    fn assemble(nodes: Vec<NodeId>, connections: Vec<(NodeId, NodeId)>) -> Self {
        let node_set: BTreeSet<NodeId> = nodes.iter().cloned().collect();
        let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> =
            nodes.iter().map(|node| (node.clone(), Vec::new())).collect();
        for (u, v) in &connections {
            adjacency.entry(u.clone()).or_default().push(v.clone());
            adjacency.entry(v.clone()).or_default().push(u.clone());
        }
        Self {
            nodes,
            node_set,
            connections,
            adjacency,
        }
    }

    /// Five-node mesh used when no topology is configured.
    pub fn default_mesh() -> Self {
        let nodes = DEFAULT_NODES.iter().map(|id| NodeId::from(*id)).collect();
        let connections = DEFAULT_CONNECTIONS
            .iter()
            .map(|(u, v)| (NodeId::from(*u), NodeId::from(*v)))
            .collect();
        Self::assemble(nodes, connections)
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.node_set.contains(node)
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn connections(&self) -> &[(NodeId, NodeId)] {
        &self.connections
    }

    pub fn neighbors(&self, node: &NodeId) -> &[NodeId] {
        self.adjacency
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_connected(&self, u: &NodeId, v: &NodeId) -> bool {
        self.neighbors(u).contains(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: &str) -> NodeId {
        NodeId::from(id)
    }

    #[test]
    fn default_mesh_is_symmetric() {
        let topology = Topology::default_mesh();
        assert_eq!(topology.nodes().len(), 5);
        assert_eq!(topology.connections().len(), 9);
        for (u, v) in topology.connections() {
            assert!(topology.is_connected(u, v));
            assert!(topology.is_connected(v, u));
        }
        assert_eq!(topology.neighbors(&n("A")), &[n("B"), n("C"), n("D")]);
        assert!(!topology.is_connected(&n("A"), &n("E")));
    }

    #[test]
    fn rejects_connection_to_undeclared_node() {
        let err = Topology::new(vec![n("A"), n("B")], vec![(n("A"), n("Z"))])
            .expect_err("Z is not declared");
        assert_eq!(
            err,
            TopologyError::UndeclaredNode {
                from: n("A"),
                to: n("Z"),
                missing: n("Z"),
            }
        );
    }

    #[test]
    fn rejects_reverse_duplicate_and_self_loop() {
        let err = Topology::new(
            vec![n("A"), n("B")],
            vec![(n("A"), n("B")), (n("B"), n("A"))],
        )
        .expect_err("B-A duplicates A-B");
        assert!(matches!(err, TopologyError::DuplicateConnection { .. }));

        let err = Topology::new(vec![n("A")], vec![(n("A"), n("A"))]).expect_err("self loop");
        assert_eq!(err, TopologyError::SelfLoop(n("A")));
    }

    #[test]
    fn unknown_node_has_no_neighbors() {
        let topology = Topology::default_mesh();
        assert!(!topology.contains(&n("Q")));
        assert!(topology.neighbors(&n("Q")).is_empty());
    }

    #[test]
    fn edge_key_formats_as_pair() {
        let key = EdgeKey::new(n("A"), n("B"));
        assert_eq!(key.to_string(), "A-B");
        assert_eq!(key.reversed().to_string(), "B-A");
    }
}
