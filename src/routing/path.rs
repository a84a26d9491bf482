//! Query result and its assembly from search-level edges

use serde::Serialize;

use super::search_graph::{EdgeTable, Traversal};
use crate::error::Result;
use crate::types::{EdgeId, NodeId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Path {
    pub found: bool,
    /// Total weight; infinite (serialized as `null`) when not found
    pub weight: f64,
    /// Meters
    pub distance: f64,
    /// Milliseconds
    pub time: u64,
    pub nodes: Vec<NodeId>,
    /// Base edges in travel order, shortcuts already unpacked
    pub edges: Vec<EdgeId>,
    pub visited_from: usize,
    pub visited_to: usize,
}

impl Path {
    pub fn not_found(visited_from: usize, visited_to: usize) -> Self {
        Self {
            found: false,
            weight: f64::INFINITY,
            distance: 0.0,
            time: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
            visited_from,
            visited_to,
        }
    }

    pub(crate) fn found(weight: f64, visited_from: usize, visited_to: usize) -> Self {
        Self {
            found: true,
            weight,
            ..Self::not_found(visited_from, visited_to)
        }
    }

    /// Append search-level traversals starting at `start`, unpacking shortcuts
    pub(crate) fn extend_with(
        &mut self,
        table: &EdgeTable,
        start: NodeId,
        traversals: &[Traversal],
    ) -> Result<()> {
        if self.nodes.last() != Some(&start) {
            self.nodes.push(start);
        }
        let mut unpacked = Vec::with_capacity(traversals.len());
        for t in traversals {
            table.unpack(t.edge, t.from, &mut unpacked)?;
        }
        for t in &unpacked {
            self.edges.push(t.edge);
            self.nodes.push(t.to);
            self.distance += table.distance(t.edge)?;
            self.time = self.time.saturating_add(table.millis(t.edge, t.from)?);
        }
        Ok(())
    }

    /// Account for a partially travelled edge at either end of the path
    pub(crate) fn add_partial(
        &mut self,
        table: &EdgeTable,
        edge: EdgeId,
        from: NodeId,
        share: f64,
    ) -> Result<()> {
        self.distance += table.distance(edge)? * share;
        self.time = self
            .time
            .saturating_add((table.millis(edge, from)? as f64 * share).round() as u64);
        Ok(())
    }

    /// Number of base edges on the path
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
