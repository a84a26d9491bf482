//! One-directional Dijkstra, the reference the other searches are checked against

use super::bidir::Frontier;
use super::path::Path;
use super::search_graph::{BaseSearchGraph, SearchGraph, Traversal};
use crate::error::{Error, Result};
use crate::types::NodeId;

#[derive(Debug)]
pub struct Dijkstra<'g> {
    graph: &'g BaseSearchGraph,
}

impl<'g> Dijkstra<'g> {
    pub fn new(graph: &'g BaseSearchGraph) -> Self {
        Self { graph }
    }

    pub fn calc_path(&self, from: NodeId, to: NodeId) -> Result<Path> {
        for node in [from, to] {
            if node as usize >= self.graph.node_count() {
                return Err(Error::InvalidNode(node));
            }
        }

        let mut frontier = Frontier::new();
        frontier.seed(from, 0.0);
        let mut reached = None;
        while let Some((node, weight)) = frontier.pop() {
            if node == to {
                reached = Some(weight);
                break;
            }
            for arc in self.graph.forward_arcs(node) {
                frontier.relax(node, weight, arc);
            }
        }

        let visited = frontier.settled_count();
        let Some(weight) = reached else {
            return Ok(Path::not_found(visited, 0));
        };
        let traversals: Vec<Traversal> = frontier
            .chain(to)?
            .into_iter()
            .rev()
            .map(|(parent, edge, child)| Traversal {
                edge,
                from: parent,
                to: child,
            })
            .collect();
        let mut path = Path::found(weight, visited, 0);
        path.extend_with(self.graph.edges(), from, &traversals)?;
        Ok(path)
    }

    /// Weight only, `+∞` when unreachable
    pub fn calc_weight(&self, from: NodeId, to: NodeId) -> Result<f64> {
        Ok(self.calc_path(from, to)?.weight)
    }
}
