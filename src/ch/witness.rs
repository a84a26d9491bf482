//! Bounded local Dijkstra deciding whether a shortcut is needed
//!
//! After `init(start, ignore)` the searcher grows one shortest-path tree from
//! `start` that never enters `ignore`. Successive `find_upper_bound` calls for
//! different targets continue the same tree instead of starting over.

use std::fmt;

use priority_queue::PriorityQueue;
use rustc_hash::FxBuildHasher;
use tracing::trace;

use super::prepare_graph::PreparationGraph;
use crate::types::{MinWeight, NodeId, NO_NODE};

pub struct WitnessPathSearcher {
    weights: Vec<f64>,
    settled: Vec<bool>,
    touched: Vec<NodeId>,
    heap: PriorityQueue<NodeId, MinWeight, FxBuildHasher>,
    ignore: NodeId,
    settled_count: usize,
}

impl fmt::Debug for WitnessPathSearcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WitnessPathSearcher")
            .field("nodes", &self.weights.len())
            .field("ignore", &self.ignore)
            .field("queued", &self.heap.len())
            .field("settled_count", &self.settled_count)
            .finish()
    }
}

impl WitnessPathSearcher {
    pub fn new(node_count: usize) -> Self {
        Self {
            weights: vec![f64::INFINITY; node_count],
            settled: vec![false; node_count],
            touched: Vec::new(),
            heap: PriorityQueue::with_default_hasher(),
            ignore: NO_NODE,
            settled_count: 0,
        }
    }

    /// Reset and seed a new search from `start` that skips `ignore`
    pub fn init(&mut self, start: NodeId, ignore: NodeId) {
        for &node in &self.touched {
            self.weights[node as usize] = f64::INFINITY;
            self.settled[node as usize] = false;
        }
        self.touched.clear();
        self.heap.clear();
        self.settled_count = 0;
        self.ignore = ignore;

        self.weights[start as usize] = 0.0;
        self.touched.push(start);
        self.heap.push(start, MinWeight(0.0));
    }

    /// Best known weight from the start to `target`, or `+∞`.
    ///
    /// Stops once `target` is settled, the queue's minimum exceeds
    /// `accepted_weight`, or `max_visited` nodes have been settled in total
    /// since `init`.
    pub fn find_upper_bound(
        &mut self,
        graph: &PreparationGraph,
        target: NodeId,
        accepted_weight: f64,
        max_visited: usize,
    ) -> f64 {
        if self.settled[target as usize] {
            return self.weights[target as usize];
        }

        while let Some((_, &MinWeight(top))) = self.heap.peek() {
            if top > accepted_weight || self.settled_count >= max_visited {
                break;
            }
            let Some((node, MinWeight(weight))) = self.heap.pop() else {
                break;
            };
            self.settled[node as usize] = true;
            self.settled_count += 1;

            for arc in graph.out_arcs(node) {
                if arc.adj == self.ignore || self.settled[arc.adj as usize] {
                    continue;
                }
                let candidate = weight + arc.weight;
                let slot = &mut self.weights[arc.adj as usize];
                if candidate < *slot {
                    if slot.is_infinite() {
                        self.touched.push(arc.adj);
                    }
                    *slot = candidate;
                    self.heap.push_increase(arc.adj, MinWeight(candidate));
                }
            }

            if node == target {
                break;
            }
        }

        trace!(
            target,
            settled = self.settled_count,
            weight = self.weights[target as usize],
            "witness search"
        );
        self.weights[target as usize]
    }

    pub fn settled_count(&self) -> usize {
        self.settled_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GraphStore;
    use crate::weighting::ShortestWeighting;

    fn triangle(direct: Option<f64>) -> PreparationGraph {
        let store = GraphStore::new();
        store.edge(0, 1, 2.0, true);
        store.edge(1, 2, 3.0, true);
        if let Some(d) = direct {
            store.edge(0, 2, d, true);
        }
        PreparationGraph::from_store(&store, &ShortestWeighting::new(50.0)).unwrap()
    }

    #[test]
    fn ignored_node_blocks_the_only_path() {
        let g = triangle(None);
        let mut s = WitnessPathSearcher::new(3);
        s.init(0, 1);
        assert!(s.find_upper_bound(&g, 2, 5.0, 100).is_infinite());

        s.init(0, NO_NODE);
        assert_eq!(s.find_upper_bound(&g, 2, 5.0, 100), 5.0);
    }

    #[test]
    fn direct_edge_is_a_witness() {
        let g = triangle(Some(4.0));
        let mut s = WitnessPathSearcher::new(3);
        s.init(0, 1);
        assert_eq!(s.find_upper_bound(&g, 2, 5.0, 100), 4.0);
        // settled state is reused
        assert_eq!(s.find_upper_bound(&g, 2, 5.0, 100), 4.0);
        assert_eq!(s.find_upper_bound(&g, 0, 5.0, 100), 0.0);
    }

    #[test]
    fn zero_budget_settles_nothing() {
        let g = triangle(Some(4.0));
        let mut s = WitnessPathSearcher::new(3);
        s.init(0, 1);
        assert!(s.find_upper_bound(&g, 2, 5.0, 0).is_infinite());
        assert_eq!(s.settled_count(), 0);
    }

    #[test]
    fn unlimited_budget_and_debug_output() {
        let g = triangle(Some(4.0));
        let mut s = WitnessPathSearcher::new(3);
        s.init(2, 1);
        assert_eq!(s.find_upper_bound(&g, 0, 5.0, usize::MAX), 4.0);
        let text = format!("{:?}", s);
        assert!(text.contains("ignore: 1"), "{}", text);
        assert!(text.contains("nodes: 3"), "{}", text);
    }
}
