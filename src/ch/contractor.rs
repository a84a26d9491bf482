//! Node contraction: priority estimation, shortcut synthesis and commit
//!
//! Shortcuts live in the preparation graph until one of their endpoints is
//! contracted; at that point their weight is final and they are written to the
//! [`ChBuilder`] relative to the contracted (lower) endpoint. Skipped-edge
//! references are stored as working ids and translated to CH edge ids by
//! [`NodeContractor::finish_contraction`].

use std::time::{Duration, Instant};

use tracing::debug;

use super::prepare_graph::{PrepArc, PreparationGraph};
use super::storage::{ChBuilder, ChStorage};
use super::witness::WitnessPathSearcher;
use crate::config::ContractionConfig;
use crate::error::{Error, Result};
use crate::types::{EdgeFlags, EdgeId, NodeId};

/// Shortcut `from → to` replacing the path through the contracted node
#[derive(Debug, Clone, Copy, PartialEq)]
struct ShortcutCandidate {
    from: NodeId,
    to: NodeId,
    skip_from: u32,
    skip_to: u32,
    weight: f64,
    time: u64,
    orig_count: u32,
}

pub struct NodeContractor {
    graph: PreparationGraph,
    searcher: WitnessPathSearcher,
    builder: ChBuilder,
    edge_difference_weight: f64,
    original_edges_count_weight: f64,
    mean_degree: f64,
    witness_budget: Option<usize>,
    witness_searches: u64,
    witness_time: Duration,
    /// CH edge id of every committed working shortcut, indexed by `slot - base_edges`
    committed: Vec<Option<EdgeId>>,
    added_shortcuts: usize,
}

impl NodeContractor {
    pub fn new(graph: PreparationGraph, builder: ChBuilder, config: &ContractionConfig) -> Self {
        let nodes = graph.node_count();
        let mean_degree = if nodes == 0 {
            0.0
        } else {
            graph.base_edge_count() as f64 / nodes as f64
        };
        Self {
            searcher: WitnessPathSearcher::new(nodes),
            graph,
            builder,
            edge_difference_weight: config.edge_difference_weight,
            original_edges_count_weight: config.original_edges_count_weight,
            mean_degree,
            witness_budget: config.witness_budget,
            witness_searches: 0,
            witness_time: Duration::ZERO,
            committed: Vec::new(),
            added_shortcuts: 0,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn mean_degree(&self) -> f64 {
        self.mean_degree
    }

    /// Settled-node budget of one witness search
    pub fn max_visited_nodes(&self) -> usize {
        self.witness_budget
            .unwrap_or_else(|| self.mean_degree.trunc() as usize * 100)
    }

    /// Witness searches run so far, one per in/out neighbor pair
    pub fn witness_searches(&self) -> u64 {
        self.witness_searches
    }

    pub fn witness_time(&self) -> Duration {
        self.witness_time
    }

    /// Shortcuts created in the preparation graph so far
    pub fn added_shortcuts(&self) -> usize {
        self.added_shortcuts
    }

    /// Shortcuts written to CH storage so far
    pub fn committed_shortcuts(&self) -> usize {
        self.builder.shortcut_count()
    }

    pub fn graph(&self) -> &PreparationGraph {
        &self.graph
    }

    /// Edge difference and original-edge count of contracting `node` now; lower is better
    pub fn calculate_priority(&mut self, node: NodeId) -> f64 {
        let (candidates, _) = self.find_shortcuts(node);
        let original_edges: u64 = candidates.iter().map(|c| c.orig_count as u64).sum();
        let edge_difference = candidates.len() as f64 - self.graph.degree(node) as f64;
        self.edge_difference_weight * edge_difference
            + self.original_edges_count_weight * original_edges as f64
    }

    /// Contract `node` and return its uncontracted neighbors
    pub fn contract_node(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        let (candidates, degree) = self.find_shortcuts(node);
        for c in &candidates {
            if self.graph.add_or_update_shortcut(
                c.from,
                c.to,
                c.skip_from,
                c.skip_to,
                c.weight,
                c.time,
                c.orig_count,
            ) {
                self.added_shortcuts += 1;
            }
        }

        self.commit_shortcuts(node)?;
        let neighbors = self.graph.disconnect(node);

        self.mean_degree = (self.mean_degree * 2.0 + degree as f64) / 3.0;
        Ok(neighbors)
    }

    pub fn set_level(&mut self, node: NodeId, level: u32) -> Result<()> {
        self.builder.set_level(node, level)
    }

    /// Translate skipped working edges into CH edge ids and hand out the storage
    pub fn finish_contraction(mut self) -> Result<ChStorage> {
        let base = self.graph.base_edge_count() as u32;
        let committed = std::mem::take(&mut self.committed);
        self.builder.replace_skipped_edges(|slot| {
            if slot.0 < base {
                Some(slot)
            } else {
                committed.get((slot.0 - base) as usize).copied().flatten()
            }
        })?;
        debug!(
            shortcuts = self.builder.shortcut_count(),
            mean_degree = self.mean_degree,
            "contraction finished"
        );
        self.builder.build()
    }

    /// Scan every in/out neighbor pair of `node` and keep the pairs without a
    /// witness. Returns the candidates and the number of incoming edges scanned.
    fn find_shortcuts(&mut self, node: NodeId) -> (Vec<ShortcutCandidate>, usize) {
        let incoming: Vec<PrepArc> = self.graph.in_arcs(node).collect();
        let outgoing: Vec<PrepArc> = self.graph.out_arcs(node).collect();
        let max_visited = self.max_visited_nodes();
        let mut candidates = Vec::new();

        for in_arc in &incoming {
            let from = in_arc.adj;
            if from == node {
                continue;
            }
            self.searcher.init(from, node);

            for out_arc in &outgoing {
                let to = out_arc.adj;
                if to == from || to == node {
                    continue;
                }
                let via = in_arc.weight + out_arc.weight;
                if !via.is_finite() {
                    continue;
                }
                let started = Instant::now();
                let witness = self
                    .searcher
                    .find_upper_bound(&self.graph, to, via, max_visited);
                self.witness_time += started.elapsed();
                self.witness_searches += 1;
                if witness <= via {
                    continue;
                }
                candidates.push(ShortcutCandidate {
                    from,
                    to,
                    skip_from: in_arc.edge,
                    skip_to: out_arc.edge,
                    weight: via,
                    time: in_arc.time.saturating_add(out_arc.time),
                    orig_count: in_arc.orig_count + out_arc.orig_count,
                });
            }
        }
        (candidates, incoming.len())
    }

    fn ch_id_of(&self, slot: u32) -> Option<EdgeId> {
        let base = self.graph.base_edge_count() as u32;
        if slot < base {
            Some(EdgeId(slot))
        } else {
            self.committed.get((slot - base) as usize).copied().flatten()
        }
    }

    fn mark_committed(&mut self, slot: u32, id: EdgeId) {
        let k = slot as usize - self.graph.base_edge_count();
        if self.committed.len() <= k {
            self.committed.resize(k + 1, None);
        }
        self.committed[k] = Some(id);
    }

    /// Write every shortcut still attached to `node` into CH storage, `node` being `from`
    fn commit_shortcuts(&mut self, node: NodeId) -> Result<()> {
        let incident: Vec<u32> = self.graph.incident(node).to_vec();
        let mut forward: Vec<(u32, u32)> = Vec::new(); // (working slot, shortcut index)

        for &slot in &incident {
            let Some(edge) = self.graph.edge(slot).copied() else {
                continue;
            };
            let Some((skip_a, skip_b)) = edge.skips else {
                continue;
            };
            if edge.a != node {
                continue;
            }
            let k = self.builder.add_shortcut(
                node,
                edge.b,
                EdgeFlags::FORWARD,
                edge.weight_ab,
                EdgeId(skip_a),
                EdgeId(skip_b),
                edge.time_ab,
                edge.orig_count,
            );
            self.mark_committed(slot, self.builder.shortcut_edge_id(k));
            forward.push((slot, k));
        }

        for &slot in &incident {
            let Some(edge) = self.graph.edge(slot).copied() else {
                continue;
            };
            let Some((skip_a, skip_b)) = edge.skips else {
                continue;
            };
            if edge.b != node {
                continue;
            }
            // seen from `node`: skip adjacent to node first
            let (skip1, skip2) = (skip_b, skip_a);
            let mapped = (self.ch_id_of(skip1), self.ch_id_of(skip2));
            if mapped.0.is_none() || mapped.1.is_none() {
                return Err(Error::InvalidRecord(format!(
                    "shortcut {} -> {} skips an uncommitted edge",
                    edge.a, edge.b
                )));
            }

            let twin = forward.iter().copied().find(|&(_, k)| {
                self.builder.shortcut(k).is_some_and(|sc| {
                    sc.to == edge.a
                        && sc.weight == edge.weight_ab
                        && (self.ch_id_of(sc.skip1.0), self.ch_id_of(sc.skip2.0)) == mapped
                })
            });

            match twin {
                Some((_, k)) => {
                    self.builder.merge_backward(k);
                    self.mark_committed(slot, self.builder.shortcut_edge_id(k));
                }
                None => {
                    let k = self.builder.add_shortcut(
                        node,
                        edge.a,
                        EdgeFlags::BACKWARD,
                        edge.weight_ab,
                        EdgeId(skip1),
                        EdgeId(skip2),
                        edge.time_ab,
                        edge.orig_count,
                    );
                    self.mark_committed(slot, self.builder.shortcut_edge_id(k));
                }
            }
        }
        Ok(())
    }
}
