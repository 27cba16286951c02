use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use crate::model::NodeId;

/// A tentative cost pushed by one relaxation. `seq` is the push order.
#[derive(Debug, Clone)]
struct Pending {
    cost: f64,
    seq: u64,
    node: NodeId,
}

impl Ord for Pending {
    // Reversed so `BinaryHeap` yields the cheapest entry, earliest push first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

/// Tentative-cost state of one search: best known costs, predecessors, the
/// settled set and a lazily pruned queue of pending costs.
///
/// Improving a node's cost pushes a new entry and leaves the old one queued;
/// `settle_next` discards entries whose cost is above the best known cost or
/// whose node is already settled.
#[derive(Debug, Default)]
pub struct SearchFrontier {
    queue: BinaryHeap<Pending>,
    next_seq: u64,
    best: BTreeMap<NodeId, f64>,
    predecessor: BTreeMap<NodeId, NodeId>,
    settled: BTreeSet<NodeId>,
}

impl SearchFrontier {
    pub fn seeded(start: NodeId) -> Self {
        let mut frontier = Self::default();
        frontier.best.insert(start.clone(), 0.0);
        frontier.enqueue(start, 0.0);
        frontier
    }

    fn enqueue(&mut self, node: NodeId, cost: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Pending { cost, seq, node });
    }

    /// Pops the cheapest live entry and marks its node settled.
    pub fn settle_next(&mut self) -> Option<(NodeId, f64)> {
        while let Some(Pending { cost, node, .. }) = self.queue.pop() {
            if cost > self.best_cost(&node) || self.settled.contains(&node) {
                continue;
            }
            self.settled.insert(node.clone());
            return Some((node, cost));
        }
        None
    }

    /// Records `from` as the predecessor of `to` if `candidate` beats the best
    /// known cost to `to`. Returns whether it did.
    pub fn relax(&mut self, from: &NodeId, to: &NodeId, candidate: f64) -> bool {
        if candidate >= self.best_cost(to) {
            return false;
        }
        self.best.insert(to.clone(), candidate);
        self.predecessor.insert(to.clone(), from.clone());
        self.enqueue(to.clone(), candidate);
        true
    }

    /// Infinite for nodes never reached.
    pub fn best_cost(&self, node: &NodeId) -> f64 {
        self.best.get(node).copied().unwrap_or(f64::INFINITY)
    }

    pub fn is_settled(&self, node: &NodeId) -> bool {
        self.settled.contains(node)
    }

    pub fn settled_count(&self) -> usize {
        self.settled.len()
    }

    pub fn predecessors(&self) -> &BTreeMap<NodeId, NodeId> {
        &self.predecessor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: &str) -> NodeId {
        NodeId::from(id)
    }

    #[test]
    fn equal_costs_settle_in_push_order() {
        let mut frontier = SearchFrontier::seeded(n("A"));
        assert_eq!(frontier.settle_next(), Some((n("A"), 0.0)));
        assert!(frontier.relax(&n("A"), &n("D"), 1.5));
        assert!(frontier.relax(&n("A"), &n("C"), 5.0));
        assert!(frontier.relax(&n("A"), &n("B"), 5.0));
        assert_eq!(frontier.settle_next(), Some((n("D"), 1.5)));
        assert_eq!(frontier.settle_next(), Some((n("C"), 5.0)));
        assert_eq!(frontier.settle_next(), Some((n("B"), 5.0)));
        assert_eq!(frontier.settle_next(), None);
    }

    #[test]
    fn superseded_cost_is_discarded() {
        let mut frontier = SearchFrontier::seeded(n("A"));
        frontier.settle_next();
        assert!(frontier.relax(&n("A"), &n("B"), 9.0));
        assert!(frontier.relax(&n("C"), &n("B"), 4.0));
        assert!(!frontier.relax(&n("D"), &n("B"), 4.0));

        assert_eq!(frontier.settle_next(), Some((n("B"), 4.0)));
        assert_eq!(frontier.settle_next(), None);
        assert_eq!(frontier.predecessors().get(&n("B")), Some(&n("C")));
        assert_eq!(frontier.settled_count(), 2);
    }

    #[test]
    fn settled_node_is_not_returned_twice() {
        let mut frontier = SearchFrontier::seeded(n("A"));
        frontier.settle_next();
        assert!(frontier.relax(&n("A"), &n("B"), 2.0));
        assert_eq!(frontier.settle_next(), Some((n("B"), 2.0)));
        assert!(frontier.is_settled(&n("B")));

        // A zero-cost edge back to the start cannot beat its settled cost.
        assert!(!frontier.relax(&n("B"), &n("A"), 0.0));
        assert_eq!(frontier.settle_next(), None);
        assert_eq!(frontier.best_cost(&n("Z")), f64::INFINITY);
    }
}
