//! End-to-end tests: store → preparation → hierarchy → queries
//!
//! Random graphs use integer distances so that every path weight is an exact
//! sum and the different searches can be compared with `==`.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use butterfly_ch::ch::{ChBuilder, NodeContractor, PrepEdge, PreparationGraph, CH_FILE};
use butterfly_ch::routing::{EdgeTable, SearchGraph};
use butterfly_ch::storage::graph_store::{
    EDGES_FILE, LATS_FILE, LONS_FILE, REFS_FILE, SETTINGS_FILE,
};
use butterfly_ch::storage::persist;
use butterfly_ch::weighting::ShortestWeighting;
use butterfly_ch::{
    weighting, BaseSearchGraph, ChBidirection, ChSearchGraph, ChStorage, ContractionConfig,
    Dijkstra, DijkstraBidirection, EdgeId, Error, GraphStore, NodeId,
    PrepareContractionHierarchies, Snap, WeightingConfig, WeightingKind,
};

fn random_graph(store: &GraphStore, nodes: usize, edges: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    store.ensure_capacity(nodes);
    for _ in 0..nodes {
        store.add_node(rng.random_range(50.0..51.0), rng.random_range(4.0..5.0));
    }
    let n = nodes as NodeId;
    for _ in 0..edges {
        let a = rng.random_range(0..n);
        let mut b = rng.random_range(0..n);
        if a == b {
            b = (b + 1) % n;
        }
        let distance = rng.random_range(1..=100) as f64;
        store.edge(a, b, distance, rng.random_bool(0.7));
    }
}

fn prepare(store: &GraphStore) -> ChStorage {
    let (ch, stats) =
        PrepareContractionHierarchies::new(ContractionConfig::default(), WeightingConfig::default())
            .run(store)
            .unwrap();
    assert_eq!(stats.nodes, store.node_count());
    assert_eq!(stats.shortcuts, ch.shortcut_count());
    ch
}

fn search_graphs(store: &GraphStore, ch: &ChStorage) -> (BaseSearchGraph, ChSearchGraph) {
    let weighting = weighting::from_config(ch.weighting());
    (
        BaseSearchGraph::new(store, Arc::clone(&weighting)).unwrap(),
        ChSearchGraph::new(store, ch, weighting).unwrap(),
    )
}

fn contract_in_order(store: &GraphStore, order: &[NodeId]) -> ChStorage {
    let graph = PreparationGraph::from_store(store, &ShortestWeighting::new(50.0)).unwrap();
    let builder =
        ChBuilder::new(store.node_count(), store.edge_count(), WeightingConfig::default());
    let mut contractor = NodeContractor::new(graph, builder, &ContractionConfig::default());
    for (level, &node) in order.iter().enumerate() {
        contractor.contract_node(node).unwrap();
        contractor.set_level(node, level as u32).unwrap();
    }
    contractor.finish_contraction().unwrap()
}

/// Weight of the base edges a path reports, walked along its nodes
fn walked_weight(table: &EdgeTable, path: &butterfly_ch::Path) -> f64 {
    path.edges
        .iter()
        .zip(path.nodes.windows(2))
        .map(|(&edge, pair)| {
            assert_eq!(table.other_end(edge, pair[0]).unwrap(), pair[1]);
            table.weight(edge, pair[0]).unwrap()
        })
        .sum()
}

#[test]
fn path_without_witness_gets_a_shortcut_and_queries_unpack_it() {
    let store = GraphStore::new();
    store.edge(0, 1, 2.0, true);
    store.edge(1, 2, 3.0, true);

    let ch = contract_in_order(&store, &[1, 0, 2]);
    assert_eq!(ch.shortcut_count(), 1);
    let sc = ch.shortcuts()[0];
    assert_eq!((sc.from, sc.to, sc.weight), (0, 2, 5.0));

    let (_, graph) = search_graphs(&store, &ch);
    let arcs: Vec<_> = graph.forward_arcs(0).iter().filter(|a| a.is_shortcut).collect();
    assert_eq!(arcs.len(), 1);
    assert_eq!(arcs[0].edge, EdgeId(2));

    for (from, to, nodes) in [(0, 2, vec![0, 1, 2]), (2, 0, vec![2, 1, 0])] {
        let path = ChBidirection::new(&graph).calc_path(from, to).unwrap();
        assert!(path.found);
        assert_eq!(path.weight, 5.0);
        assert_eq!(path.nodes, nodes);
        assert_eq!(path.len(), 2);
    }
}

#[test]
fn direct_edge_is_a_witness() {
    let store = GraphStore::new();
    store.edge(0, 1, 2.0, true);
    store.edge(1, 2, 3.0, true);
    store.edge(0, 2, 4.0, true);

    let ch = contract_in_order(&store, &[1, 0, 2]);
    assert_eq!(ch.shortcut_count(), 0);

    let (_, graph) = search_graphs(&store, &ch);
    let path = ChBidirection::new(&graph).calc_path(0, 2).unwrap();
    assert_eq!(path.weight, 4.0);
    assert_eq!(path.edges, vec![EdgeId(2)]);
}

#[test]
fn store_without_edges() {
    let store = GraphStore::new();
    for i in 0..3 {
        assert_eq!(store.add_node(i as f32, 0.0), i);
    }
    for node in 0..3 {
        assert_eq!(store.edges_of(node, true, true).count(), 0);
    }

    let ch = prepare(&store);
    assert_eq!(ch.shortcut_count(), 0);
    let mut levels = ch.levels().to_vec();
    levels.sort_unstable();
    assert_eq!(levels, vec![0, 1, 2]);

    let (base, graph) = search_graphs(&store, &ch);
    assert!(!ChBidirection::new(&graph).calc_path(0, 2).unwrap().found);
    assert!(!DijkstraBidirection::new(&base).calc_path(0, 2).unwrap().found);
}

#[test]
fn searches_agree_on_random_graphs() {
    for seed in [1, 2, 3] {
        let store = GraphStore::new();
        random_graph(&store, 80, 200, seed);
        let ch = prepare(&store);
        let (base, graph) = search_graphs(&store, &ch);

        let mut rng = StdRng::seed_from_u64(seed + 100);
        for _ in 0..150 {
            let from = rng.random_range(0..80);
            let to = rng.random_range(0..80);

            let reference = Dijkstra::new(&base).calc_path(from, to).unwrap();
            let bidir = DijkstraBidirection::new(&base).calc_path(from, to).unwrap();
            let hierarchy = ChBidirection::new(&graph).calc_path(from, to).unwrap();

            assert_eq!(bidir.weight, reference.weight, "bidirectional {} -> {}", from, to);
            assert_eq!(hierarchy.weight, reference.weight, "hierarchy {} -> {}", from, to);
            assert_eq!(hierarchy.found, reference.found);

            if hierarchy.found {
                assert_eq!(hierarchy.nodes.first(), Some(&from));
                assert_eq!(hierarchy.nodes.last(), Some(&to));
                assert_eq!(hierarchy.nodes.len(), hierarchy.edges.len() + 1);
                assert_eq!(walked_weight(graph.edges(), &hierarchy), hierarchy.weight);
                assert_eq!(walked_weight(base.edges(), &bidir), bidir.weight);
                assert_eq!(hierarchy.distance, hierarchy.weight);
            }
        }
    }
}

#[test]
fn fastest_weighting_hierarchy_matches_dijkstra() {
    let store = GraphStore::new();
    random_graph(&store, 60, 150, 9);
    let config = WeightingConfig {
        kind: WeightingKind::Fastest,
        speed_kmh: 36.0,
    };
    let (ch, _) = PrepareContractionHierarchies::new(ContractionConfig::default(), config)
        .run(&store)
        .unwrap();
    assert_eq!(ch.weighting().kind, WeightingKind::Fastest);
    let (base, graph) = search_graphs(&store, &ch);

    let mut rng = StdRng::seed_from_u64(10);
    for _ in 0..100 {
        let (from, to) = (rng.random_range(0..60), rng.random_range(0..60));
        let expected = Dijkstra::new(&base).calc_weight(from, to).unwrap();
        let actual = ChBidirection::new(&graph).calc_path(from, to).unwrap();
        if expected.is_infinite() {
            assert!(!actual.found);
        } else {
            assert!((actual.weight - expected).abs() < 1e-9 * expected.max(1.0));
            // 10 m/s
            assert!((actual.weight - actual.distance / 10.0).abs() < 1e-6);
            let millis = (actual.weight * 1000.0).round() as i64;
            assert!((actual.time as i64 - millis).abs() <= actual.len() as i64);
        }
    }
}

#[test]
fn shortcuts_unpack_to_their_weight() {
    let store = GraphStore::new();
    random_graph(&store, 100, 260, 4);
    let ch = prepare(&store);
    assert!(ch.shortcut_count() > 0);
    let (base, graph) = search_graphs(&store, &ch);
    let table = graph.edges();

    for (k, sc) in ch.shortcuts().iter().enumerate() {
        let id = EdgeId((ch.base_edge_count() + k) as u32);
        assert!(sc.skip1 < id && sc.skip2 < id);
        assert!(ch.level(sc.from) < ch.level(sc.to));

        let (start, end) = if sc.flags.is_forward() {
            (sc.from, sc.to)
        } else {
            (sc.to, sc.from)
        };
        let mut walked = Vec::new();
        table.unpack(id, start, &mut walked).unwrap();
        assert_eq!(walked.first().map(|t| t.from), Some(start));
        assert_eq!(walked.last().map(|t| t.to), Some(end));
        assert!(walked.windows(2).all(|w| w[0].to == w[1].from));
        let weight: f64 = walked.iter().map(|t| table.weight(t.edge, t.from).unwrap()).sum();
        assert_eq!(weight, sc.weight);
        assert_eq!(walked.len(), sc.orig_count as usize);

        // a shortcut never undercuts the true distance
        let shortest = Dijkstra::new(&base).calc_weight(start, end).unwrap();
        assert!(shortest <= sc.weight);
    }
}

/// Single-source weights over the working graph that never enter `avoid`
fn weights_avoiding(graph: &PreparationGraph, start: NodeId, avoid: NodeId) -> Vec<f64> {
    let n = graph.node_count();
    let mut weights = vec![f64::INFINITY; n];
    let mut settled = vec![false; n];
    weights[start as usize] = 0.0;
    loop {
        let next = (0..n)
            .filter(|&v| !settled[v] && weights[v].is_finite())
            .min_by(|&a, &b| weights[a].total_cmp(&weights[b]));
        let Some(node) = next else {
            break;
        };
        settled[node] = true;
        for arc in graph.out_arcs(node as NodeId) {
            if arc.adj == avoid {
                continue;
            }
            let weight = weights[node] + arc.weight;
            if weight < weights[arc.adj as usize] {
                weights[arc.adj as usize] = weight;
            }
        }
    }
    weights
}

fn slots(graph: &PreparationGraph) -> Vec<Option<PrepEdge>> {
    (0..graph.slot_count() as u32).map(|s| graph.edge(s).copied()).collect()
}

#[test]
fn unbounded_witness_search_adds_only_needed_shortcuts() {
    let config = ContractionConfig {
        witness_budget: Some(usize::MAX),
        ..ContractionConfig::default()
    };
    let mut checked = 0;
    for seed in [21, 22, 23] {
        let store = GraphStore::new();
        random_graph(&store, 50, 130, seed);
        let (ch, _) = PrepareContractionHierarchies::new(config.clone(), WeightingConfig::default())
            .run(&store)
            .unwrap();
        let mut order = vec![0; store.node_count()];
        for node in 0..store.node_count() as NodeId {
            order[ch.level(node) as usize] = node;
        }

        let graph = PreparationGraph::from_store(&store, &ShortestWeighting::new(50.0)).unwrap();
        let builder =
            ChBuilder::new(store.node_count(), store.edge_count(), WeightingConfig::default());
        let mut contractor = NodeContractor::new(graph, builder, &config);
        for (level, &node) in order.iter().enumerate() {
            // exact weights between the neighbors while `node` is still present
            let before = slots(contractor.graph());
            let from_neighbor: HashMap<NodeId, Vec<f64>> = contractor
                .graph()
                .in_arcs(node)
                .map(|arc| (arc.adj, weights_avoiding(contractor.graph(), arc.adj, node)))
                .collect();

            contractor.contract_node(node).unwrap();
            contractor.set_level(node, level as u32).unwrap();

            for (slot, after) in slots(contractor.graph()).into_iter().enumerate() {
                let Some(edge) = after.filter(|e| e.is_shortcut()) else {
                    continue;
                };
                let old = before.get(slot).copied().flatten();
                if old == Some(edge) {
                    continue;
                }
                let directions = [
                    (edge.a, edge.b, edge.weight_ab, old.map(|o| o.weight_ab)),
                    (edge.b, edge.a, edge.weight_ba, old.map(|o| o.weight_ba)),
                ];
                for (start, end, weight, previous) in directions {
                    if !weight.is_finite() || previous == Some(weight) {
                        continue;
                    }
                    let witness = from_neighbor[&start][end as usize];
                    assert!(
                        witness > weight,
                        "seed {}: shortcut {} -> {} ({}) around {} has a witness of {}",
                        seed,
                        start,
                        end,
                        weight,
                        node,
                        witness
                    );
                    checked += 1;
                }
            }
        }
        contractor.finish_contraction().unwrap();
    }
    assert!(checked > 0);
}

/// Zero distances, parallel edges and self-loops
fn tie_heavy_graph(store: &GraphStore, nodes: usize, edges: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..nodes {
        store.add_node(0.0, 0.0);
    }
    let n = nodes as NodeId;
    for _ in 0..edges {
        let a = rng.random_range(0..n);
        let b = if rng.random_bool(0.1) { a } else { rng.random_range(0..n) };
        let distance = [0.0, 0.0, 1.0, 1.0, 2.0, 5.0][rng.random_range(0..6)];
        let bidirectional = rng.random_bool(0.6);
        store.edge(a, b, distance, bidirectional);
        if rng.random_bool(0.2) {
            store.edge(a, b, distance + rng.random_range(0..2) as f64, bidirectional);
        }
    }
}

#[test]
fn ties_parallel_edges_and_loops_keep_hierarchy_exact() {
    for seed in 30..40 {
        let store = GraphStore::new();
        tie_heavy_graph(&store, 25, 60, seed);
        let ch = prepare(&store);
        let (base, graph) = search_graphs(&store, &ch);

        for from in 0..25 {
            for to in 0..25 {
                let expected = Dijkstra::new(&base).calc_weight(from, to).unwrap();
                let path = ChBidirection::new(&graph).calc_path(from, to).unwrap();
                assert_eq!(path.weight, expected, "seed {}: {} -> {}", seed, from, to);
                if path.found {
                    assert_eq!(walked_weight(graph.edges(), &path), expected);
                }
            }
        }
    }
}

#[test]
fn concurrent_queries_match_sequential_answers() {
    let store = GraphStore::new();
    random_graph(&store, 120, 320, 5);
    let ch = prepare(&store);
    let (_, graph) = search_graphs(&store, &ch);

    let mut rng = StdRng::seed_from_u64(6);
    let pairs: Vec<(NodeId, NodeId)> = (0..200)
        .map(|_| (rng.random_range(0..120), rng.random_range(0..120)))
        .collect();
    let sequential: Vec<f64> = pairs
        .iter()
        .map(|&(a, b)| ChBidirection::new(&graph).calc_path(a, b).unwrap().weight)
        .collect();

    let graph = &graph;
    std::thread::scope(|scope| {
        let handles: Vec<_> = pairs
            .chunks(25)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|&(a, b)| ChBidirection::new(graph).calc_path(a, b).unwrap().weight)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let concurrent: Vec<f64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        assert_eq!(concurrent, sequential);
    });
}

#[test]
fn deleted_nodes_are_not_traversed() {
    let store = GraphStore::new();
    store.edge(0, 1, 1.0, true);
    store.edge(1, 2, 1.0, true);
    store.edge(0, 3, 5.0, true);
    store.edge(3, 2, 5.0, true);
    store.mark_deleted(1).unwrap();
    assert_eq!(store.optimize(), 1);

    let ch = prepare(&store);
    let (base, graph) = search_graphs(&store, &ch);
    let path = ChBidirection::new(&graph).calc_path(0, 2).unwrap();
    assert_eq!(path.weight, 10.0);
    assert_eq!(path.nodes, vec![0, 3, 2]);
    assert_eq!(DijkstraBidirection::new(&base).calc_path(0, 2).unwrap().weight, 10.0);
    assert!(!ChBidirection::new(&graph).calc_path(0, 1).unwrap().found);
}

#[test]
fn snapped_queries_agree() {
    let store = GraphStore::new();
    random_graph(&store, 50, 130, 7);
    let ch = prepare(&store);
    let (base, graph) = search_graphs(&store, &ch);
    let states = store.base_edges().unwrap();

    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..100 {
        let a = &states[rng.random_range(0..states.len())];
        let b = &states[rng.random_range(0..states.len())];
        let from = Snap::on_edge(a, rng.random_range(0..=4) as f64 / 4.0);
        let to = Snap::on_edge(b, rng.random_range(0..=4) as f64 / 4.0);

        let plain = DijkstraBidirection::new(&base).calc_path_between(&from, &to).unwrap();
        let hierarchy = ChBidirection::new(&graph).calc_path_between(&from, &to).unwrap();
        assert_eq!(plain.found, hierarchy.found);
        if plain.found {
            assert_eq!(plain.weight, hierarchy.weight);
            assert_eq!(hierarchy.edges.first(), Some(&a.edge));
            assert_eq!(hierarchy.edges.last(), Some(&b.edge));
        }
    }
}

#[test]
fn store_persistence_round_trip_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");

    let store = GraphStore::create(&first).unwrap();
    random_graph(&store, 40, 90, 11);
    store.flush().unwrap();

    let loaded = GraphStore::load(&first).unwrap();
    assert_eq!(loaded.node_count(), store.node_count());
    assert_eq!(loaded.edge_count(), store.edge_count());
    assert_eq!(loaded.creation_time_ms(), store.creation_time_ms());
    for node in 0..store.node_count() as NodeId {
        assert_eq!(loaded.lat(node).unwrap(), store.lat(node).unwrap());
        assert_eq!(loaded.lon(node).unwrap(), store.lon(node).unwrap());
        let before: Vec<_> = store.edges_of(node, true, true).map(|s| s.unwrap()).collect();
        let after: Vec<_> = loaded.edges_of(node, true, true).map(|s| s.unwrap()).collect();
        assert_eq!(before, after);
    }

    loaded.save_to(&second).unwrap();
    for file in [LATS_FILE, LONS_FILE, EDGES_FILE, REFS_FILE, SETTINGS_FILE] {
        assert_eq!(
            std::fs::read(first.join(file)).unwrap(),
            std::fs::read(second.join(file)).unwrap(),
            "{} differs",
            file
        );
    }

    assert!(matches!(
        GraphStore::load(dir.path().join("absent")),
        Err(Error::MissingStorage(_))
    ));
}

#[test]
fn hierarchy_survives_a_reload() {
    let dir = TempDir::new().unwrap();
    let store = GraphStore::create(dir.path()).unwrap();
    random_graph(&store, 60, 150, 12);
    store.flush().unwrap();
    let ch = prepare(&store);
    ch.save(&dir.path().join(CH_FILE)).unwrap();

    let store = GraphStore::load(dir.path()).unwrap();
    let reloaded = ChStorage::load(&dir.path().join(CH_FILE)).unwrap();
    assert_eq!(reloaded.levels(), ch.levels());
    assert_eq!(reloaded.shortcuts(), ch.shortcuts());

    let (base, graph) = search_graphs(&store, &reloaded);
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..50 {
        let (a, b) = (rng.random_range(0..60), rng.random_range(0..60));
        assert_eq!(
            ChBidirection::new(&graph).calc_path(a, b).unwrap().weight,
            Dijkstra::new(&base).calc_weight(a, b).unwrap()
        );
    }

    // a hierarchy built for another graph is refused
    let other = GraphStore::new();
    random_graph(&other, 10, 20, 14);
    let weighting = weighting::from_config(reloaded.weighting());
    assert!(ChSearchGraph::new(&other, &reloaded, weighting).is_err());
}

#[test]
fn cyclic_adjacency_list_is_detected_on_load() {
    let dir = TempDir::new().unwrap();
    let store = GraphStore::create(dir.path()).unwrap();
    store.edge(0, 1, 1.0, true);
    store.edge(0, 2, 1.0, true);
    store.flush().unwrap();

    // point the second record of node 0's list back at the first
    let path = dir.path().join(EDGES_FILE);
    let mut words = persist::read_ints(&path).unwrap();
    let record = 2; // edge 1, side of node 0
    words[record * 5 + 4] = 0;
    persist::write_ints(&path, &words).unwrap();

    let err = GraphStore::load(dir.path()).unwrap_err();
    assert!(err.is_corruption(), "{}", err);
    assert!(matches!(err, Error::Corruption { node: 0, .. }));
}

#[test]
fn truncated_file_is_malformed() {
    let dir = TempDir::new().unwrap();
    let store = GraphStore::create(dir.path()).unwrap();
    store.edge(0, 1, 1.0, true);
    store.flush().unwrap();

    let path = dir.path().join(LATS_FILE);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
    assert!(matches!(GraphStore::load(dir.path()), Err(Error::Malformed { .. })));
}
