//! Shortest path queries
//!
//! Search graphs are built once and shared; every query builds its own
//! search object, so queries run concurrently without locking.

pub mod bidir;
pub mod ch_bidir;
pub mod dijkstra;
pub mod dijkstra_bidir;
pub mod path;
pub mod search_graph;

pub use bidir::{calc_path, calc_path_between, BidirCore, BidirSearch, Snap};
pub use ch_bidir::ChBidirection;
pub use dijkstra::Dijkstra;
pub use dijkstra_bidir::DijkstraBidirection;
pub use path::Path;
pub use search_graph::{
    BaseSearchGraph, ChSearchGraph, EdgeTable, SearchArc, SearchGraph, Traversal,
};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ch::PrepareContractionHierarchies;
    use crate::config::{ContractionConfig, WeightingConfig};
    use crate::storage::GraphStore;
    use crate::types::EdgeId;
    use crate::weighting::ShortestWeighting;

    /// A -1- B -2- C two-way, plus a one-way C -> D of 4
    fn line() -> GraphStore {
        let store = GraphStore::new();
        store.edge(0, 1, 1.0, true);
        store.edge(1, 2, 2.0, true);
        store.edge(2, 3, 4.0, false);
        store
    }

    fn graphs(store: &GraphStore) -> (BaseSearchGraph, ChSearchGraph) {
        let weighting = Arc::new(ShortestWeighting::new(50.0));
        let (ch, _) = PrepareContractionHierarchies::new(
            ContractionConfig::default(),
            WeightingConfig::default(),
        )
        .run(store)
        .unwrap();
        (
            BaseSearchGraph::new(store, weighting.clone()).unwrap(),
            ChSearchGraph::new(store, &ch, weighting).unwrap(),
        )
    }

    #[test]
    fn all_searches_agree_on_a_line() {
        let store = line();
        let (base, ch) = graphs(&store);

        let p = DijkstraBidirection::new(&base).calc_path(0, 3).unwrap();
        assert!(p.found);
        assert_eq!(p.weight, 7.0);
        assert_eq!(p.nodes, vec![0, 1, 2, 3]);
        assert_eq!(p.edges, vec![EdgeId(0), EdgeId(1), EdgeId(2)]);
        assert_eq!(p.distance, 7.0);

        let c = ChBidirection::new(&ch).calc_path(0, 3).unwrap();
        assert_eq!(c.weight, 7.0);
        assert_eq!(c.nodes, p.nodes);
        assert_eq!(c.edges, p.edges);

        assert_eq!(Dijkstra::new(&base).calc_weight(0, 3).unwrap(), 7.0);
    }

    #[test]
    fn one_way_edge_blocks_the_return() {
        let store = line();
        let (base, ch) = graphs(&store);
        assert!(!DijkstraBidirection::new(&base).calc_path(3, 0).unwrap().found);
        assert!(!ChBidirection::new(&ch).calc_path(3, 0).unwrap().found);
        assert!(Dijkstra::new(&base).calc_weight(3, 0).unwrap().is_infinite());
    }

    #[test]
    fn same_node_is_an_empty_path() {
        let store = line();
        let (base, ch) = graphs(&store);
        for p in [
            DijkstraBidirection::new(&base).calc_path(1, 1).unwrap(),
            ChBidirection::new(&ch).calc_path(1, 1).unwrap(),
        ] {
            assert!(p.found);
            assert_eq!(p.weight, 0.0);
            assert_eq!(p.nodes, vec![1]);
            assert!(p.is_empty());
        }
    }

    #[test]
    fn search_state_is_debuggable() {
        let store = line();
        let (base, ch) = graphs(&store);
        let mut search = DijkstraBidirection::new(&base);
        assert_eq!(BidirSearch::node_count(&search), 4);
        search.init_from(0, 0.0);
        let text = format!("{:?}", search);
        assert!(text.contains("Frontier"), "{}", text);
        assert!(text.contains("queued: 1"), "{}", text);
        assert!(format!("{:?}", ChBidirection::new(&ch)).contains("best"));
    }

    #[test]
    fn unknown_node_is_rejected() {
        let store = line();
        let (base, ch) = graphs(&store);
        assert!(matches!(
            DijkstraBidirection::new(&base).calc_path(0, 9),
            Err(crate::Error::InvalidNode(9))
        ));
        assert!(ChBidirection::new(&ch).calc_path(9, 0).is_err());
    }

    #[test]
    fn snapped_endpoints_add_partial_edges() {
        let store = line();
        let (base, ch) = graphs(&store);
        // a quarter along A-B to half way along B-C
        let from = Snap::new(EdgeId(0), 0, 1, 0.25);
        let to = Snap::new(EdgeId(1), 1, 2, 0.5);

        for p in [
            DijkstraBidirection::new(&base).calc_path_between(&from, &to).unwrap(),
            ChBidirection::new(&ch).calc_path_between(&from, &to).unwrap(),
        ] {
            assert!(p.found);
            assert_eq!(p.weight, 1.75);
            assert_eq!(p.nodes, vec![1]);
            assert_eq!(p.edges, vec![EdgeId(0), EdgeId(1)]);
            assert!((p.distance - 1.75).abs() < 1e-9);
        }
    }

    #[test]
    fn snaps_on_the_same_edge_connect_directly() {
        let store = line();
        let (base, _) = graphs(&store);
        let from = Snap::new(EdgeId(1), 1, 2, 0.75);
        // described from the other end: 0.5 from C is 0.5 from B
        let to = Snap::new(EdgeId(1), 2, 1, 0.5);

        let p = DijkstraBidirection::new(&base).calc_path_between(&from, &to).unwrap();
        assert!(p.found);
        assert_eq!(p.weight, 0.5);
        assert_eq!(p.edges, vec![EdgeId(1)]);
        assert!(p.nodes.is_empty());

        // against a one-way edge the direct connection is not allowed
        let from = Snap::new(EdgeId(2), 2, 3, 0.75);
        let to = Snap::new(EdgeId(2), 2, 3, 0.25);
        assert!(!DijkstraBidirection::new(&base).calc_path_between(&from, &to).unwrap().found);
    }
}
