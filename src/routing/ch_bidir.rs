//! Upward bidirectional search over a contraction hierarchy

use super::bidir::{self, delegate_to_core, BidirCore, BidirSearch, Snap};
use super::path::Path;
use super::search_graph::ChSearchGraph;
use crate::error::Result;
use crate::types::NodeId;

/// Both sides only climb, so the searches may cross far from the meeting
/// point; each side runs until its own queue top reaches the best weight.
#[derive(Debug)]
pub struct ChBidirection<'g> {
    core: BidirCore<'g, ChSearchGraph>,
}

impl<'g> ChBidirection<'g> {
    pub fn new(graph: &'g ChSearchGraph) -> Self {
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

impl BidirSearch for ChBidirection<'_> {
    delegate_to_core!();

    fn finished(&self) -> bool {
        self.core.top_from() >= self.core.best() && self.core.top_to() >= self.core.best()
    }
}
