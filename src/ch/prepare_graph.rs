//! Mutable working graph used while contracting
//!
//! Every edge (base or shortcut) lives in one slot and is listed at both of
//! its endpoints. Slot ids double as working edge ids: base edge `e` keeps
//! slot `e`, shortcuts are appended behind the base edges. Contracted nodes
//! are disconnected, so explorers only ever see the remaining graph.

use crate::error::Result;
use crate::storage::GraphStore;
use crate::types::{EdgeId, NodeId};
use crate::weighting::Weighting;

/// Working edge between `a` and `b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepEdge {
    pub a: NodeId,
    pub b: NodeId,
    /// Weight `a → b`, infinite when not allowed
    pub weight_ab: f64,
    /// Weight `b → a`, infinite when not allowed
    pub weight_ba: f64,
    pub time_ab: u64,
    pub time_ba: u64,
    pub orig_count: u32,
    /// Skipped working edges adjacent to `a` and to `b`; `None` for base edges
    pub skips: Option<(u32, u32)>,
}

impl PrepEdge {
    pub fn is_shortcut(&self) -> bool {
        self.skips.is_some()
    }
}

/// One traversable direction of a working edge as seen from the explored node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepArc {
    pub edge: u32,
    pub adj: NodeId,
    pub weight: f64,
    pub time: u64,
    pub orig_count: u32,
    pub is_shortcut: bool,
}

#[derive(Debug)]
pub struct PreparationGraph {
    edges: Vec<PrepEdge>,
    adjacency: Vec<Vec<u32>>,
    base_edges: usize,
}

impl PreparationGraph {
    /// Build from the store; self-loops, edges blocked in both directions and
    /// edges touching deleted nodes are left out
    pub fn from_store(store: &GraphStore, weighting: &dyn Weighting) -> Result<Self> {
        let states = store.base_edges()?;
        let n = store.node_count();
        let mut graph = Self {
            edges: Vec::with_capacity(states.len() + states.len() / 2),
            adjacency: vec![Vec::new(); n],
            base_edges: states.len(),
        };

        for state in &states {
            let weight_ab = weighting.calc_weight(state, false);
            let weight_ba = weighting.calc_weight(state, true);
            let slot = graph.edges.len() as u32;
            graph.edges.push(PrepEdge {
                a: state.base,
                b: state.adj,
                weight_ab,
                weight_ba,
                time_ab: weighting.calc_millis(state, false),
                time_ba: weighting.calc_millis(state, true),
                orig_count: 1,
                skips: None,
            });

            let usable = state.base != state.adj
                && (weight_ab.is_finite() || weight_ba.is_finite())
                && !store.is_deleted(state.base)
                && !store.is_deleted(state.adj);
            if usable {
                graph.adjacency[state.base as usize].push(slot);
                graph.adjacency[state.adj as usize].push(slot);
            }
        }
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn base_edge_count(&self) -> usize {
        self.base_edges
    }

    pub fn edge(&self, slot: u32) -> Option<&PrepEdge> {
        self.edges.get(slot as usize)
    }

    pub fn slot_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges still incident to `node`
    pub fn degree(&self, node: NodeId) -> usize {
        self.adjacency[node as usize].len()
    }

    /// Working edges incident to `node`
    pub fn incident(&self, node: NodeId) -> &[u32] {
        &self.adjacency[node as usize]
    }

    /// Arcs leaving `node`
    pub fn out_arcs(&self, node: NodeId) -> impl Iterator<Item = PrepArc> + '_ {
        self.arcs(node, false)
    }

    /// Arcs entering `node`; `adj` is the tail and `weight` the cost `adj → node`
    pub fn in_arcs(&self, node: NodeId) -> impl Iterator<Item = PrepArc> + '_ {
        self.arcs(node, true)
    }

    fn arcs(&self, node: NodeId, incoming: bool) -> impl Iterator<Item = PrepArc> + '_ {
        self.adjacency[node as usize].iter().filter_map(move |&slot| {
            let e = &self.edges[slot as usize];
            // leaving `a` and entering `b` both traverse a -> b
            let (weight, time) = if (e.a == node) != incoming {
                (e.weight_ab, e.time_ab)
            } else {
                (e.weight_ba, e.time_ba)
            };
            let adj = if e.a == node { e.b } else { e.a };
            if !weight.is_finite() {
                return None;
            }
            Some(PrepArc {
                edge: slot,
                adj,
                weight,
                time,
                orig_count: e.orig_count,
                is_shortcut: e.is_shortcut(),
            })
        })
    }

    /// Existing shortcut `from → to`, if any
    fn find_shortcut(&self, from: NodeId, to: NodeId) -> Option<u32> {
        self.adjacency[from as usize].iter().copied().find(|&slot| {
            let e = &self.edges[slot as usize];
            e.is_shortcut() && e.a == from && e.b == to
        })
    }

    /// Lower an existing shortcut `from → to` or add a new one.
    ///
    /// `skip_from` is the working edge adjacent to `from`, `skip_to` the one
    /// adjacent to `to`. Returns true when a new shortcut was created.
    #[allow(clippy::too_many_arguments)]
    pub fn add_or_update_shortcut(
        &mut self,
        from: NodeId,
        to: NodeId,
        skip_from: u32,
        skip_to: u32,
        weight: f64,
        time: u64,
        orig_count: u32,
    ) -> bool {
        if let Some(slot) = self.find_shortcut(from, to) {
            let e = &mut self.edges[slot as usize];
            if weight < e.weight_ab {
                e.weight_ab = weight;
                e.time_ab = time;
                e.orig_count = orig_count;
                e.skips = Some((skip_from, skip_to));
            }
            return false;
        }

        let slot = self.edges.len() as u32;
        self.edges.push(PrepEdge {
            a: from,
            b: to,
            weight_ab: weight,
            weight_ba: f64::INFINITY,
            time_ab: time,
            time_ba: u64::MAX,
            orig_count,
            skips: Some((skip_from, skip_to)),
        });
        self.adjacency[from as usize].push(slot);
        self.adjacency[to as usize].push(slot);
        true
    }

    /// Remove `node` from its neighbors' lists; returns the distinct neighbors
    pub fn disconnect(&mut self, node: NodeId) -> Vec<NodeId> {
        let incident = std::mem::take(&mut self.adjacency[node as usize]);
        let mut neighbors = Vec::with_capacity(incident.len());
        for slot in incident {
            let e = self.edges[slot as usize];
            let other = if e.a == node { e.b } else { e.a };
            let list = &mut self.adjacency[other as usize];
            if let Some(pos) = list.iter().position(|&s| s == slot) {
                list.swap_remove(pos);
            }
            if !neighbors.contains(&other) {
                neighbors.push(other);
            }
        }
        neighbors
    }

    /// Working id of a base edge
    pub fn base_slot(&self, edge: EdgeId) -> Option<u32> {
        (edge.index() < self.base_edges).then_some(edge.0)
    }
}
