//! Graph storage: node coordinates, edge arena and the flat on-disk layout

pub mod arena;
pub mod checksum;
pub mod graph_store;
pub mod persist;

pub use graph_store::{EdgeIter, EdgeState, GraphStore};
