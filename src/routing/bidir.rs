//! Bidirectional search skeleton
//!
//! [`BidirSearch`] is the hook set a search variant provides; [`calc_path`] and
//! [`calc_path_between`] drive any variant: seed both sides, let them settle
//! one node each in turn until the variant reports `finished` or both
//! frontiers are exhausted, then extract the path.
//!
//! [`BidirCore`] holds the state the variants share: two frontiers, the best
//! meeting found so far and the snapped endpoints.

use std::fmt;

use priority_queue::PriorityQueue;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use serde::Serialize;

use super::path::Path;
use super::search_graph::{SearchArc, SearchGraph, Traversal};
use crate::error::{Error, Result};
use crate::storage::EdgeState;
use crate::types::{EdgeId, MinWeight, NodeId};

/// Query endpoint on an edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snap {
    pub edge: EdgeId,
    pub base: NodeId,
    pub adj: NodeId,
    /// Position along the edge: 0 at `base`, 1 at `adj`
    pub fraction: f64,
}

impl Snap {
    pub fn new(edge: EdgeId, base: NodeId, adj: NodeId, fraction: f64) -> Self {
        Self {
            edge,
            base,
            adj,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    pub fn on_edge(state: &EdgeState, fraction: f64) -> Self {
        Self::new(state.edge, state.base, state.adj, fraction)
    }

    /// Same point described from the other endpoint
    pub fn flipped(&self) -> Self {
        Self {
            edge: self.edge,
            base: self.adj,
            adj: self.base,
            fraction: 1.0 - self.fraction,
        }
    }
}

/// Cost of walking `share` of an edge; standing still is free even against a one-way edge
fn portion(share: f64, weight: f64) -> Option<f64> {
    if share <= 0.0 {
        Some(0.0)
    } else if weight.is_finite() {
        Some(share * weight)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Label {
    weight: f64,
    /// Previous node of the tree and the edge connecting it
    parent: Option<(NodeId, EdgeId)>,
}

/// One side of a Dijkstra search
pub(crate) struct Frontier {
    labels: FxHashMap<NodeId, Label>,
    heap: PriorityQueue<NodeId, MinWeight, FxBuildHasher>,
    settled: FxHashSet<NodeId>,
}

impl fmt::Debug for Frontier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frontier")
            .field("labels", &self.labels.len())
            .field("queued", &self.heap.len())
            .field("settled", &self.settled.len())
            .finish()
    }
}

impl Frontier {
    pub(crate) fn new() -> Self {
        Self {
            labels: FxHashMap::default(),
            heap: PriorityQueue::with_default_hasher(),
            settled: FxHashSet::default(),
        }
    }

    pub(crate) fn seed(&mut self, node: NodeId, weight: f64) -> bool {
        if !weight.is_finite() || weight >= self.weight(node).unwrap_or(f64::INFINITY) {
            return false;
        }
        self.labels.insert(node, Label { weight, parent: None });
        self.heap.push_increase(node, MinWeight(weight));
        true
    }

    pub(crate) fn weight(&self, node: NodeId) -> Option<f64> {
        self.labels.get(&node).map(|l| l.weight)
    }

    /// Smallest queued weight, `+∞` once exhausted
    pub(crate) fn top(&self) -> f64 {
        self.heap.peek().map_or(f64::INFINITY, |(_, w)| w.0)
    }

    pub(crate) fn pop(&mut self) -> Option<(NodeId, f64)> {
        let (node, MinWeight(weight)) = self.heap.pop()?;
        self.settled.insert(node);
        Some((node, weight))
    }

    /// Try to improve `arc.adj` through `node`; returns the new weight
    pub(crate) fn relax(&mut self, node: NodeId, weight: f64, arc: &SearchArc) -> Option<f64> {
        if self.settled.contains(&arc.adj) {
            return None;
        }
        let candidate = weight + arc.weight;
        if candidate >= self.weight(arc.adj).unwrap_or(f64::INFINITY) {
            return None;
        }
        self.labels.insert(
            arc.adj,
            Label {
                weight: candidate,
                parent: Some((node, arc.edge)),
            },
        );
        self.heap.push_increase(arc.adj, MinWeight(candidate));
        Some(candidate)
    }

    pub(crate) fn settled_count(&self) -> usize {
        self.settled.len()
    }

    /// Tree edges from `node` back to the root as `(parent, edge, child)`
    pub(crate) fn chain(&self, node: NodeId) -> Result<Vec<(NodeId, EdgeId, NodeId)>> {
        let mut chain = Vec::new();
        let mut current = node;
        while let Some((parent, edge)) = self.labels.get(&current).and_then(|l| l.parent) {
            chain.push((parent, edge, current));
            if chain.len() > self.labels.len() {
                return Err(Error::InvalidRecord(format!(
                    "search tree does not lead back to a root from node {}",
                    node
                )));
            }
            current = parent;
        }
        Ok(chain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Meeting {
    None,
    Node(NodeId),
    /// Both snaps on the same edge, travelled directly; `reverse` means adj → base
    OnEdge { reverse: bool },
}

/// State shared by the bidirectional variants
#[derive(Debug)]
pub struct BidirCore<'g, G: SearchGraph> {
    graph: &'g G,
    from: Frontier,
    to: Frontier,
    best: f64,
    meeting: Meeting,
    from_snap: Option<Snap>,
    to_snap: Option<Snap>,
}

impl<'g, G: SearchGraph> BidirCore<'g, G> {
    pub fn new(graph: &'g G) -> Self {
        Self {
            graph,
            from: Frontier::new(),
            to: Frontier::new(),
            best: f64::INFINITY,
            meeting: Meeting::None,
            from_snap: None,
            to_snap: None,
        }
    }

    pub fn graph(&self) -> &'g G {
        self.graph
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn top_from(&self) -> f64 {
        self.from.top()
    }

    pub fn top_to(&self) -> f64 {
        self.to.top()
    }

    pub fn visited_from(&self) -> usize {
        self.from.settled_count()
    }

    pub fn visited_to(&self) -> usize {
        self.to.settled_count()
    }

    fn update_best(&mut self, weight: f64, node: NodeId) {
        if weight < self.best {
            self.best = weight;
            self.meeting = Meeting::Node(node);
        }
    }

    pub fn init_from(&mut self, node: NodeId, weight: f64) {
        if self.from.seed(node, weight) {
            if let Some(other) = self.to.weight(node) {
                self.update_best(weight + other, node);
            }
        }
    }

    pub fn init_to(&mut self, node: NodeId, weight: f64) {
        if self.to.seed(node, weight) {
            if let Some(other) = self.from.weight(node) {
                self.update_best(weight + other, node);
            }
        }
    }

    /// Full weights `base → adj` and `adj → base` of the snapped edge
    fn snap_weights(&self, snap: &Snap) -> Result<(f64, f64)> {
        let table = self.graph.edges();
        if table.other_end(snap.edge, snap.base)? != snap.adj {
            return Err(Error::InvalidNode(snap.adj));
        }
        Ok((table.weight(snap.edge, snap.base)?, table.weight(snap.edge, snap.adj)?))
    }

    pub fn init_from_snap(&mut self, snap: &Snap) -> Result<()> {
        let (forward, backward) = self.snap_weights(snap)?;
        self.from_snap = Some(*snap);
        if let Some(weight) = portion(1.0 - snap.fraction, forward) {
            self.init_from(snap.adj, weight);
        }
        if let Some(weight) = portion(snap.fraction, backward) {
            self.init_from(snap.base, weight);
        }
        Ok(())
    }

    pub fn init_to_snap(&mut self, snap: &Snap) -> Result<()> {
        let (forward, backward) = self.snap_weights(snap)?;
        self.to_snap = Some(*snap);
        if let Some(weight) = portion(snap.fraction, forward) {
            self.init_to(snap.base, weight);
        }
        if let Some(weight) = portion(1.0 - snap.fraction, backward) {
            self.init_to(snap.adj, weight);
        }
        Ok(())
    }

    /// Detect start and end on the same edge and record the direct connection
    pub fn check_state(&mut self) -> Result<()> {
        let (Some(from), Some(to)) = (self.from_snap, self.to_snap) else {
            return Ok(());
        };
        if from.edge != to.edge {
            return Ok(());
        }
        let to = if to.base == from.base { to } else { to.flipped() };
        if to.base != from.base || to.adj != from.adj {
            return Err(Error::InvalidEdge(to.edge));
        }

        let (forward, backward) = self.snap_weights(&from)?;
        let delta = to.fraction - from.fraction;
        let direct = if delta >= 0.0 {
            portion(delta, forward).map(|w| (w, false))
        } else {
            portion(-delta, backward).map(|w| (w, true))
        };
        if let Some((weight, reverse)) = direct {
            if weight < self.best {
                self.best = weight;
                self.meeting = Meeting::OnEdge { reverse };
            }
        }
        Ok(())
    }

    /// Settle the cheapest node of the source side; false once exhausted
    pub fn fill_edges_from(&mut self) -> bool {
        let Some((node, weight)) = self.from.pop() else {
            return false;
        };
        let graph = self.graph;
        for arc in graph.forward_arcs(node) {
            if let Some(reached) = self.from.relax(node, weight, arc) {
                if let Some(other) = self.to.weight(arc.adj) {
                    self.update_best(reached + other, arc.adj);
                }
            }
        }
        true
    }

    /// Settle the cheapest node of the target side; false once exhausted
    pub fn fill_edges_to(&mut self) -> bool {
        let Some((node, weight)) = self.to.pop() else {
            return false;
        };
        let graph = self.graph;
        for arc in graph.backward_arcs(node) {
            if let Some(reached) = self.to.relax(node, weight, arc) {
                if let Some(other) = self.from.weight(arc.adj) {
                    self.update_best(reached + other, arc.adj);
                }
            }
        }
        true
    }

    pub fn extract_path(&self) -> Result<Path> {
        let table = self.graph.edges();
        let (visited_from, visited_to) = (self.visited_from(), self.visited_to());

        let meet = match self.meeting {
            Meeting::None => return Ok(Path::not_found(visited_from, visited_to)),
            Meeting::OnEdge { reverse } => {
                let (Some(from), Some(to)) = (self.from_snap, self.to_snap) else {
                    return Err(Error::InvalidRecord("direct edge meeting without snaps".into()));
                };
                let to = if to.base == from.base { to } else { to.flipped() };
                let mut path = Path::found(self.best, visited_from, visited_to);
                path.edges.push(from.edge);
                let walked_from = if reverse { from.adj } else { from.base };
                let share = (to.fraction - from.fraction).abs();
                path.add_partial(table, from.edge, walked_from, share)?;
                return Ok(path);
            }
            Meeting::Node(node) => node,
        };

        let mut path = Path::found(self.best, visited_from, visited_to);

        let from_chain = self.from.chain(meet)?;
        let start = from_chain.last().map_or(meet, |&(parent, _, _)| parent);
        let mut traversals: Vec<Traversal> = from_chain
            .iter()
            .rev()
            .map(|&(parent, edge, child)| Traversal {
                edge,
                from: parent,
                to: child,
            })
            .collect();

        // the target side's parent is the next node towards the target
        let to_chain = self.to.chain(meet)?;
        let end = to_chain.last().map_or(meet, |&(next, _, _)| next);
        traversals.extend(to_chain.iter().map(|&(next, edge, node)| Traversal {
            edge,
            from: node,
            to: next,
        }));

        if let Some(snap) = self.from_snap {
            path.edges.push(snap.edge);
            if start == snap.adj {
                path.add_partial(table, snap.edge, snap.base, 1.0 - snap.fraction)?;
            } else {
                path.add_partial(table, snap.edge, snap.adj, snap.fraction)?;
            }
        }

        path.extend_with(table, start, &traversals)?;

        if let Some(snap) = self.to_snap {
            if end == snap.base {
                path.add_partial(table, snap.edge, snap.base, snap.fraction)?;
            } else {
                path.add_partial(table, snap.edge, snap.adj, 1.0 - snap.fraction)?;
            }
            path.edges.push(snap.edge);
        }
        Ok(path)
    }
}

/// Hooks of a bidirectional search variant
pub trait BidirSearch {
    fn node_count(&self) -> usize;
    fn init_from(&mut self, node: NodeId, weight: f64);
    fn init_to(&mut self, node: NodeId, weight: f64);
    fn init_from_snap(&mut self, snap: &Snap) -> Result<()>;
    fn init_to_snap(&mut self, snap: &Snap) -> Result<()>;
    fn check_state(&mut self) -> Result<()>;
    /// Settle one node of the source side; false once exhausted
    fn fill_edges_from(&mut self) -> bool;
    /// Settle one node of the target side; false once exhausted
    fn fill_edges_to(&mut self) -> bool;
    /// No unsettled node can improve the best meeting any more
    fn finished(&self) -> bool;
    fn extract_path(&self) -> Result<Path>;
}

/// Alternate between both sides until the variant is done
pub fn run_search<S: BidirSearch + ?Sized>(search: &mut S) {
    let mut finished_from = false;
    let mut finished_to = false;
    while !search.finished() && !(finished_from && finished_to) {
        if !finished_from {
            finished_from = !search.fill_edges_from();
        }
        if !finished_to {
            finished_to = !search.fill_edges_to();
        }
    }
}

/// Shortest path between two nodes
pub fn calc_path<S: BidirSearch + ?Sized>(
    search: &mut S,
    from: NodeId,
    to: NodeId,
) -> Result<Path> {
    for node in [from, to] {
        if node as usize >= search.node_count() {
            return Err(Error::InvalidNode(node));
        }
    }
    search.init_from(from, 0.0);
    search.init_to(to, 0.0);
    run_search(search);
    search.extract_path()
}

/// Shortest path between two points snapped onto edges
pub fn calc_path_between<S: BidirSearch + ?Sized>(
    search: &mut S,
    from: &Snap,
    to: &Snap,
) -> Result<Path> {
    search.init_from_snap(from)?;
    search.init_to_snap(to)?;
    search.check_state()?;
    run_search(search);
    search.extract_path()
}

/// Implement [`BidirSearch`] for a variant wrapping a `core: BidirCore`
macro_rules! delegate_to_core {
    () => {
        fn node_count(&self) -> usize {
            $crate::routing::SearchGraph::node_count(self.core.graph())
        }

        fn init_from(&mut self, node: NodeId, weight: f64) {
            self.core.init_from(node, weight)
        }

        fn init_to(&mut self, node: NodeId, weight: f64) {
            self.core.init_to(node, weight)
        }

        fn init_from_snap(&mut self, snap: &Snap) -> Result<()> {
            self.core.init_from_snap(snap)
        }

        fn init_to_snap(&mut self, snap: &Snap) -> Result<()> {
            self.core.init_to_snap(snap)
        }

        fn check_state(&mut self) -> Result<()> {
            self.core.check_state()
        }

        fn fill_edges_from(&mut self) -> bool {
            self.core.fill_edges_from()
        }

        fn fill_edges_to(&mut self) -> bool {
            self.core.fill_edges_to()
        }

        fn extract_path(&self) -> Result<Path> {
            self.core.extract_path()
        }
    };
}

pub(crate) use delegate_to_core;

#[cfg(test)]
mod tests {
    use super::*;

    fn arc(adj: NodeId, weight: f64) -> SearchArc {
        SearchArc {
            edge: EdgeId(adj),
            adj,
            weight,
            is_shortcut: false,
        }
    }

    #[test]
    fn frontier_settles_in_weight_order() {
        let mut f = Frontier::new();
        assert!(f.seed(0, 0.0));
        assert!(!f.seed(0, 1.0));
        assert_eq!(f.top(), 0.0);

        let (node, w) = f.pop().unwrap();
        assert_eq!((node, w), (0, 0.0));
        assert_eq!(f.relax(0, w, &arc(1, 5.0)), Some(5.0));
        assert_eq!(f.relax(0, w, &arc(2, 1.0)), Some(1.0));
        assert_eq!(f.relax(0, w, &arc(1, 7.0)), None);
        assert_eq!(f.pop().map(|(n, _)| n), Some(2));
        assert_eq!(f.relax(2, 1.0, &arc(1, 1.0)), Some(2.0));

        let chain = f.chain(1).unwrap();
        assert_eq!(chain, vec![(2, EdgeId(1), 1), (0, EdgeId(2), 2)]);
        assert_eq!(f.settled_count(), 2);
        assert!(f.pop().is_some());
        assert!(f.top().is_infinite());
    }

    #[test]
    fn snap_flip_keeps_position() {
        let s = Snap::new(EdgeId(3), 1, 2, 0.25);
        let f = s.flipped();
        assert_eq!((f.base, f.adj), (2, 1));
        assert_eq!(f.fraction, 0.75);
        assert_eq!(f.flipped(), s);
        assert_eq!(Snap::new(EdgeId(0), 0, 1, 1.5).fraction, 1.0);
    }
}
