//! Contraction order and the main preparation loop
//!
//! Nodes are polled from a min priority queue. With lazy updates enabled the
//! polled node's priority is recomputed first and the node is re-queued when
//! it is no longer the cheapest. After each contraction the neighbors'
//! priorities are refreshed.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use priority_queue::PriorityQueue;
use rustc_hash::FxBuildHasher;
use tracing::{debug, info};

use super::contractor::NodeContractor;
use super::prepare_graph::PreparationGraph;
use super::storage::{ChBuilder, ChStorage};
use super::ChStats;
use crate::config::{ContractionConfig, WeightingConfig};
use crate::error::Result;
use crate::storage::GraphStore;
use crate::types::NodeId;
use crate::weighting::{self, Weighting};

/// Queue key: lowest priority first, ties broken by lower node id
#[derive(Debug, Clone, Copy, PartialEq)]
struct ContractionKey {
    priority: f64,
    node: NodeId,
}

impl Eq for ContractionKey {}

impl PartialOrd for ContractionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContractionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

pub struct PrepareContractionHierarchies {
    config: ContractionConfig,
    weighting_config: WeightingConfig,
    weighting: Arc<dyn Weighting>,
}

impl PrepareContractionHierarchies {
    pub fn new(config: ContractionConfig, weighting_config: WeightingConfig) -> Self {
        Self {
            weighting: weighting::from_config(&weighting_config),
            config,
            weighting_config,
        }
    }

    pub fn weighting(&self) -> &Arc<dyn Weighting> {
        &self.weighting
    }

    /// Contract every node of `store` and return the hierarchy
    pub fn run(&self, store: &GraphStore) -> Result<(ChStorage, ChStats)> {
        let started = Instant::now();
        let graph = PreparationGraph::from_store(store, self.weighting.as_ref())?;
        let node_count = graph.node_count();
        let base_edges = graph.base_edge_count();
        info!(
            nodes = node_count,
            edges = base_edges,
            weighting = self.weighting.name(),
            "preparing contraction hierarchy"
        );

        let builder = ChBuilder::new(node_count, base_edges, self.weighting_config.clone());
        let mut contractor = NodeContractor::new(graph, builder, &self.config);

        let mut queue: PriorityQueue<NodeId, ContractionKey, FxBuildHasher> =
            PriorityQueue::with_capacity_and_default_hasher(node_count);
        for node in 0..node_count as NodeId {
            let priority = contractor.calculate_priority(node);
            queue.push(node, ContractionKey { priority, node });
        }
        let initial_ms = started.elapsed().as_millis() as u64;
        debug!(ms = initial_ms, "initial priorities computed");

        let log_every = if self.config.log_messages_percent > 0.0 {
            ((node_count as f64 * self.config.log_messages_percent / 100.0).round() as usize).max(1)
        } else {
            usize::MAX
        };

        let mut level: u32 = 0;
        let mut lazy_requeues: u64 = 0;
        while let Some((node, _)) = queue.pop() {
            if self.config.lazy_updates && !queue.is_empty() {
                let priority = contractor.calculate_priority(node);
                let key = ContractionKey { priority, node };
                // a smaller key in max-queue order is a higher contraction priority
                if queue.peek().is_some_and(|(_, next)| key < *next) {
                    queue.push(node, key);
                    lazy_requeues += 1;
                    continue;
                }
            }

            let neighbors = contractor.contract_node(node)?;
            contractor.set_level(node, level)?;
            level += 1;

            for neighbor in neighbors {
                if queue.get(&neighbor).is_some() {
                    let priority = contractor.calculate_priority(neighbor);
                    queue.change_priority(&neighbor, ContractionKey { priority, node: neighbor });
                }
            }

            if level as usize % log_every == 0 {
                info!(
                    contracted = level,
                    nodes = node_count,
                    shortcuts = contractor.added_shortcuts(),
                    mean_degree = contractor.mean_degree(),
                    budget = contractor.max_visited_nodes(),
                    "contraction progress"
                );
            }
        }

        let added = contractor.added_shortcuts();
        let mean_degree = contractor.mean_degree();
        let witness_searches = contractor.witness_searches();
        let witness_ms = contractor.witness_time().as_millis() as u64;
        let ch = contractor.finish_contraction()?;
        let stats = ChStats {
            nodes: node_count,
            base_edges,
            shortcuts: ch.shortcut_count(),
            added_shortcuts: added,
            lazy_requeues,
            mean_degree,
            witness_searches,
            witness_ms,
            initial_priorities_ms: initial_ms,
            total_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            shortcuts = stats.shortcuts,
            witness_searches = stats.witness_searches,
            witness_ms = stats.witness_ms,
            ms = stats.total_ms,
            "contraction hierarchy ready"
        );
        Ok((ch, stats))
    }
}
