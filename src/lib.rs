//! # Butterfly-ch Library
//!
//! Contraction Hierarchies for road graphs: a compact concurrent graph store,
//! offline node contraction with witness search, and bidirectional shortest
//! path queries over the resulting hierarchy.
//!
//! ## Features
//!
//! - **Graph store**: index-addressed nodes and edges with linked adjacency
//!   lists, many readers and one writer, CRC-checked flat files on disk
//! - **Preparation**: lazy-update node ordering, bounded witness searches,
//!   merged bidirectional shortcuts
//! - **Queries**: plain and CH bidirectional Dijkstra, start and end on nodes
//!   or anywhere along an edge, shortcuts unpacked into base edges
//!
//! ## Basic Usage
//!
//! ```rust
//! use butterfly_ch::{
//!     weighting, ChBidirection, ChSearchGraph, ContractionConfig, GraphStore,
//!     PrepareContractionHierarchies, WeightingConfig,
//! };
//!
//! # fn main() -> butterfly_ch::Result<()> {
//! let store = GraphStore::new();
//! store.edge(0, 1, 120.0, true);
//! store.edge(1, 2, 80.0, true);
//!
//! let contraction = ContractionConfig::default();
//! let prepare = PrepareContractionHierarchies::new(contraction, WeightingConfig::default());
//! let (ch, _stats) = prepare.run(&store)?;
//!
//! let graph = ChSearchGraph::new(&store, &ch, weighting::from_config(ch.weighting()))?;
//! let path = ChBidirection::new(&graph).calc_path(0, 2)?;
//! assert_eq!(path.weight, 200.0);
//! assert_eq!(path.nodes, vec![0, 1, 2]);
//! # Ok(())
//! # }
//! ```

pub mod ch;
pub mod config;
pub mod error;
pub mod routing;
pub mod storage;
pub mod types;
pub mod validate;
pub mod weighting;

pub use ch::{ChStats, ChStorage, PrepareContractionHierarchies};
pub use config::{ChConfig, ContractionConfig, WeightingConfig, WeightingKind};
pub use error::{Error, Result};
pub use routing::{
    BaseSearchGraph, ChBidirection, ChSearchGraph, Dijkstra, DijkstraBidirection, Path, Snap,
};
pub use storage::GraphStore;
pub use types::{EdgeFlags, EdgeId, NodeId};
pub use weighting::Weighting;
