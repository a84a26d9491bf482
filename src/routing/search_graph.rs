//! Immutable CSR graphs queried by the searches
//!
//! [`BaseSearchGraph`] exposes every traversable direction of the store's
//! edges. [`ChSearchGraph`] keeps only arcs leading to a higher level, base
//! edges and shortcuts alike: forward arcs for the search from the source,
//! backward arcs for the search from the target. Both are `Sync` and shared
//! between concurrent queries.

use std::sync::Arc;

use crate::ch::{ChStorage, Shortcut};
use crate::error::{Error, Result};
use crate::storage::{EdgeState, GraphStore};
use crate::types::{EdgeId, NodeId};
use crate::weighting::Weighting;

/// One arc of an explorer; `weight` is the cost in the explored direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchArc {
    pub edge: EdgeId,
    pub adj: NodeId,
    pub weight: f64,
    pub is_shortcut: bool,
}

/// An edge walked in a given direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traversal {
    pub edge: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
}

#[derive(Debug, Default)]
struct Csr {
    offsets: Vec<u32>,
    arcs: Vec<SearchArc>,
}

impl Csr {
    fn build(node_count: usize, entries: Vec<(NodeId, SearchArc)>) -> Self {
        let mut offsets = vec![0u32; node_count + 1];
        for (node, _) in &entries {
            offsets[*node as usize + 1] += 1;
        }
        for i in 0..node_count {
            offsets[i + 1] += offsets[i];
        }
        let mut cursor = offsets.clone();
        let mut arcs = vec![
            SearchArc {
                edge: EdgeId(0),
                adj: 0,
                weight: 0.0,
                is_shortcut: false,
            };
            entries.len()
        ];
        for (node, arc) in entries {
            let slot = &mut cursor[node as usize];
            arcs[*slot as usize] = arc;
            *slot += 1;
        }
        Self { offsets, arcs }
    }

    #[inline]
    fn neighbors(&self, node: NodeId) -> &[SearchArc] {
        let n = node as usize;
        match (self.offsets.get(n), self.offsets.get(n + 1)) {
            (Some(&start), Some(&end)) => &self.arcs[start as usize..end as usize],
            _ => &[],
        }
    }
}

/// Endpoints and costs of every edge a search may report
#[derive(Debug)]
pub struct EdgeTable {
    base: Vec<EdgeState>,
    shortcuts: Vec<Shortcut>,
    weighting: Arc<dyn Weighting>,
}

impl EdgeTable {
    fn new(base: Vec<EdgeState>, shortcuts: Vec<Shortcut>, weighting: Arc<dyn Weighting>) -> Self {
        Self {
            base,
            shortcuts,
            weighting,
        }
    }

    pub fn base_edge_count(&self) -> usize {
        self.base.len()
    }

    pub fn weighting(&self) -> &Arc<dyn Weighting> {
        &self.weighting
    }

    fn shortcut(&self, edge: EdgeId) -> Option<&Shortcut> {
        edge.index()
            .checked_sub(self.base.len())
            .and_then(|k| self.shortcuts.get(k))
    }

    /// Base edge seen from `from`
    fn directed(&self, edge: EdgeId, from: NodeId) -> Result<EdgeState> {
        let state = self.base.get(edge.index()).ok_or(Error::InvalidEdge(edge))?;
        if state.base == from {
            Ok(*state)
        } else if state.adj == from {
            Ok(state.reversed())
        } else {
            Err(Error::InvalidNode(from))
        }
    }

    pub fn other_end(&self, edge: EdgeId, node: NodeId) -> Result<NodeId> {
        if let Some(sc) = self.shortcut(edge) {
            return sc.other_end(node).ok_or(Error::InvalidNode(node));
        }
        Ok(self.directed(edge, node)?.adj)
    }

    /// Weight of walking base edge `edge` away from `from`
    pub fn weight(&self, edge: EdgeId, from: NodeId) -> Result<f64> {
        Ok(self.weighting.calc_weight(&self.directed(edge, from)?, false))
    }

    pub fn millis(&self, edge: EdgeId, from: NodeId) -> Result<u64> {
        Ok(self.weighting.calc_millis(&self.directed(edge, from)?, false))
    }

    pub fn distance(&self, edge: EdgeId) -> Result<f64> {
        self.base
            .get(edge.index())
            .map(|s| s.distance)
            .ok_or(Error::InvalidEdge(edge))
    }

    /// Expand `edge` walked from `from` into base edge traversals
    pub fn unpack(&self, edge: EdgeId, from: NodeId, out: &mut Vec<Traversal>) -> Result<()> {
        let Some(sc) = self.shortcut(edge) else {
            let to = self.directed(edge, from)?.adj;
            out.push(Traversal { edge, from, to });
            return Ok(());
        };

        // skip ids are strictly smaller than the shortcut's own id
        if from == sc.from {
            let middle = self.other_end(sc.skip1, sc.from)?;
            self.unpack(sc.skip1, sc.from, out)?;
            self.unpack(sc.skip2, middle, out)
        } else if from == sc.to {
            let middle = self.other_end(sc.skip2, sc.to)?;
            self.unpack(sc.skip2, sc.to, out)?;
            self.unpack(sc.skip1, middle, out)
        } else {
            Err(Error::InvalidNode(from))
        }
    }
}

/// Explorer interface shared by the bidirectional searches
pub trait SearchGraph: Send + Sync {
    fn node_count(&self) -> usize;

    /// Arcs the search from the source may follow out of `node`
    fn forward_arcs(&self, node: NodeId) -> &[SearchArc];

    /// Arcs the search from the target may follow back from `node`;
    /// `adj` is the arc's tail and `weight` the cost `adj → node`
    fn backward_arcs(&self, node: NodeId) -> &[SearchArc];

    fn edges(&self) -> &EdgeTable;
}

fn keeps(store: &GraphStore, state: &EdgeState) -> bool {
    state.base != state.adj && !store.is_deleted(state.base) && !store.is_deleted(state.adj)
}

/// Plain graph over the store's edges
#[derive(Debug)]
pub struct BaseSearchGraph {
    out: Csr,
    inc: Csr,
    table: EdgeTable,
}

impl BaseSearchGraph {
    pub fn new(store: &GraphStore, weighting: Arc<dyn Weighting>) -> Result<Self> {
        let states = store.base_edges()?;
        let n = store.node_count();
        let mut out = Vec::with_capacity(states.len() * 2);
        let mut inc = Vec::with_capacity(states.len() * 2);

        for state in states.iter().filter(|s| keeps(store, s)) {
            for reverse in [false, true] {
                let weight = weighting.calc_weight(state, reverse);
                if !weight.is_finite() {
                    continue;
                }
                let (tail, head) = if reverse {
                    (state.adj, state.base)
                } else {
                    (state.base, state.adj)
                };
                let arc = |adj| SearchArc {
                    edge: state.edge,
                    adj,
                    weight,
                    is_shortcut: false,
                };
                out.push((tail, arc(head)));
                inc.push((head, arc(tail)));
            }
        }

        Ok(Self {
            out: Csr::build(n, out),
            inc: Csr::build(n, inc),
            table: EdgeTable::new(states, Vec::new(), weighting),
        })
    }
}

impl SearchGraph for BaseSearchGraph {
    fn node_count(&self) -> usize {
        self.out.offsets.len().saturating_sub(1)
    }

    fn forward_arcs(&self, node: NodeId) -> &[SearchArc] {
        self.out.neighbors(node)
    }

    fn backward_arcs(&self, node: NodeId) -> &[SearchArc] {
        self.inc.neighbors(node)
    }

    fn edges(&self) -> &EdgeTable {
        &self.table
    }
}

/// Upward-only graph built from the store plus a prepared hierarchy
#[derive(Debug)]
pub struct ChSearchGraph {
    up_out: Csr,
    up_in: Csr,
    levels: Vec<u32>,
    table: EdgeTable,
}

impl ChSearchGraph {
    pub fn new(store: &GraphStore, ch: &ChStorage, weighting: Arc<dyn Weighting>) -> Result<Self> {
        let states = store.base_edges()?;
        let n = store.node_count();
        if ch.node_count() != n || ch.base_edge_count() != states.len() {
            return Err(Error::InvalidRecord(format!(
                "hierarchy was prepared for {} nodes and {} edges, graph has {} and {}",
                ch.node_count(),
                ch.base_edge_count(),
                n,
                states.len()
            )));
        }
        let levels = ch.levels().to_vec();
        let level = |node: NodeId| levels[node as usize];

        let mut up_out = Vec::new();
        let mut up_in = Vec::new();
        let mut push =
            |low: NodeId, high: NodeId, edge, up_weight: f64, down_weight: f64, is_shortcut| {
                let arc = |weight| SearchArc {
                    edge,
                    adj: high,
                    weight,
                    is_shortcut,
                };
                if up_weight.is_finite() {
                    up_out.push((low, arc(up_weight)));
                }
                if down_weight.is_finite() {
                    up_in.push((low, arc(down_weight)));
                }
            };

        for state in states.iter().filter(|s| keeps(store, s)) {
            let w_ab = weighting.calc_weight(state, false);
            let w_ba = weighting.calc_weight(state, true);
            if level(state.base) < level(state.adj) {
                push(state.base, state.adj, state.edge, w_ab, w_ba, false);
            } else {
                push(state.adj, state.base, state.edge, w_ba, w_ab, false);
            }
        }

        for (k, sc) in ch.shortcuts().iter().enumerate() {
            let edge = EdgeId((states.len() + k) as u32);
            let up = if sc.flags.is_forward() { sc.weight } else { f64::INFINITY };
            let down = if sc.flags.is_backward() { sc.weight } else { f64::INFINITY };
            push(sc.from, sc.to, edge, up, down, true);
        }

        Ok(Self {
            up_out: Csr::build(n, up_out),
            up_in: Csr::build(n, up_in),
            table: EdgeTable::new(states, ch.shortcuts().to_vec(), weighting),
            levels,
        })
    }

    pub fn level(&self, node: NodeId) -> Option<u32> {
        self.levels.get(node as usize).copied()
    }
}

impl SearchGraph for ChSearchGraph {
    fn node_count(&self) -> usize {
        self.levels.len()
    }

    fn forward_arcs(&self, node: NodeId) -> &[SearchArc] {
        self.up_out.neighbors(node)
    }

    fn backward_arcs(&self, node: NodeId) -> &[SearchArc] {
        self.up_in.neighbors(node)
    }

    fn edges(&self) -> &EdgeTable {
        &self.table
    }
}
