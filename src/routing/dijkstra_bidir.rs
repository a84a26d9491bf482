//! Bidirectional Dijkstra over the plain graph

use super::bidir::{self, delegate_to_core, BidirCore, BidirSearch, Snap};
use super::path::Path;
use super::search_graph::BaseSearchGraph;
use crate::error::Result;
use crate::types::NodeId;

/// Stops once the two queue tops together cannot beat the best meeting
#[derive(Debug)]
pub struct DijkstraBidirection<'g> {
    core: BidirCore<'g, BaseSearchGraph>,
}

impl<'g> DijkstraBidirection<'g> {
    pub fn new(graph: &'g BaseSearchGraph) -> Self {
        Self {
            core: BidirCore::new(graph),
        }
    }

    pub fn calc_path(mut self, from: NodeId, to: NodeId) -> Result<Path> {
        bidir::calc_path(&mut self, from, to)
    }

    pub fn calc_path_between(mut self, from: &Snap, to: &Snap) -> Result<Path> {
        bidir::calc_path_between(&mut self, from, to)
    }
}

impl BidirSearch for DijkstraBidirection<'_> {
    delegate_to_core!();

    fn finished(&self) -> bool {
        self.core.top_from() + self.core.top_to() >= self.core.best()
    }
}
