//! Contraction Hierarchies preparation
//!
//! 1. [`PreparationGraph`] - working copy of the store's edges
//! 2. [`WitnessPathSearcher`] - bounded search deciding if a shortcut is needed
//! 3. [`NodeContractor`] - priorities, shortcuts, commit into [`ChBuilder`]
//! 4. [`PrepareContractionHierarchies`] - node ordering loop
//!
//! The result is a [`ChStorage`]: one level per node plus the shortcut edges.

pub mod contractor;
pub mod format;
pub mod prepare;
pub mod prepare_graph;
pub mod storage;
pub mod witness;

use serde::Serialize;

pub use contractor::NodeContractor;
pub use format::CH_FILE;
pub use prepare::PrepareContractionHierarchies;
pub use prepare_graph::{PrepArc, PrepEdge, PreparationGraph};
pub use storage::{ChBuilder, ChStorage, Shortcut, NO_LEVEL};
pub use witness::WitnessPathSearcher;

/// Statistics from CH construction
#[derive(Debug, Clone, Serialize)]
pub struct ChStats {
    pub nodes: usize,
    pub base_edges: usize,
    /// Shortcuts written to CH storage (after merging both directions)
    pub shortcuts: usize,
    /// Shortcuts created in the working graph
    pub added_shortcuts: usize,
    pub lazy_requeues: u64,
    pub mean_degree: f64,
    /// Bounded local searches run while estimating and contracting
    pub witness_searches: u64,
    pub witness_ms: u64,
    pub initial_priorities_ms: u64,
    pub total_ms: u64,
}

impl ChStats {
    pub fn print(&self) {
        println!("\n=== CONTRACTION HIERARCHY ===");
        println!("  Nodes:            {}", self.nodes);
        println!("  Base edges:       {}", self.base_edges);
        println!("  Shortcuts:        {} ({} created)", self.shortcuts, self.added_shortcuts);
        println!("  Lazy re-queues:   {}", self.lazy_requeues);
        println!("  Final mean degree {:.2}", self.mean_degree);
        println!("  Witness searches: {} ({} ms)", self.witness_searches, self.witness_ms);
        println!("  Priorities:       {} ms", self.initial_priorities_ms);
        println!("  Total:            {} ms", self.total_ms);
    }
}
