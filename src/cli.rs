//! CLI commands for butterfly-ch

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use butterfly_ch::ch::CH_FILE;
use butterfly_ch::validate::validate_ch;
use butterfly_ch::{
    weighting, BaseSearchGraph, ChBidirection, ChConfig, ChSearchGraph, ChStorage,
    DijkstraBidirection, GraphStore, NodeId, Path as RoutePath, PrepareContractionHierarchies,
    WeightingKind,
};

#[derive(Parser)]
#[command(name = "butterfly-ch")]
#[command(about = "Contraction Hierarchies preprocessing and shortest path queries")]
#[command(long_about = "Builds and queries Contraction Hierarchies over a persisted road graph:
  butterfly-ch import graph.txt ./graph      # Text graph into a graph directory
  butterfly-ch contract ./graph              # Build the hierarchy (ch.bin)
  butterfly-ch route ./graph --from 0 --to 42
  butterfly-ch validate ./graph --queries 1000

Text graph format, one entry per line:
  n <lat> <lon>                              # next node id
  e <from> <to> <distance> <bidirectional>   # bidirectional is 0/1 or true/false")]
#[command(version = env!("BUTTERFLY_VERSION"))]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a text graph into a graph directory
    Import {
        /// Text graph file
        input: PathBuf,
        /// Output graph directory
        graph: PathBuf,
    },

    /// Build the Contraction Hierarchy of a graph directory
    Contract {
        /// Graph directory
        graph: PathBuf,
        /// Weighting, overrides the configuration file
        #[arg(long, value_enum)]
        weighting: Option<WeightingKind>,
        /// Constant speed for the fastest weighting, in km/h
        #[arg(long)]
        speed_kmh: Option<f64>,
        /// Factor on the edge difference in the node priority
        #[arg(long)]
        edge_difference_weight: Option<f64>,
        /// Factor on the original edge count in the node priority
        #[arg(long)]
        original_edges_count_weight: Option<f64>,
        /// Contract nodes in their initial priority order
        #[arg(long)]
        no_lazy_updates: bool,
    },

    /// Shortest path between two nodes
    Route {
        /// Graph directory
        graph: PathBuf,
        #[arg(long)]
        from: NodeId,
        #[arg(long)]
        to: NodeId,
        /// Print the path as JSON
        #[arg(long)]
        json: bool,
        /// Plain bidirectional Dijkstra instead of the hierarchy
        #[arg(long)]
        dijkstra: bool,
    },

    /// Compare hierarchy queries against Dijkstra on random node pairs
    Validate {
        /// Graph directory
        graph: PathBuf,
        #[arg(long, default_value = "1000")]
        queries: usize,
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show graph and hierarchy statistics
    Info {
        /// Graph directory
        graph: PathBuf,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ChConfig::from_file(path)?,
        None => ChConfig::default(),
    };

    match cli.command {
        Commands::Import { input, graph } => import(&input, &graph),
        Commands::Contract {
            graph,
            weighting,
            speed_kmh,
            edge_difference_weight,
            original_edges_count_weight,
            no_lazy_updates,
        } => {
            let mut config = config;
            if let Some(kind) = weighting {
                config.weighting.kind = kind;
            }
            if let Some(speed) = speed_kmh {
                config.weighting.speed_kmh = speed;
            }
            if let Some(w) = edge_difference_weight {
                config.contraction.edge_difference_weight = w;
            }
            if let Some(w) = original_edges_count_weight {
                config.contraction.original_edges_count_weight = w;
            }
            if no_lazy_updates {
                config.contraction.lazy_updates = false;
            }
            config.validate()?;
            contract(&graph, config)
        }
        Commands::Route {
            graph,
            from,
            to,
            json,
            dijkstra,
        } => route(&graph, from, to, json, dijkstra),
        Commands::Validate { graph, queries, seed } => validate(&graph, queries, seed),
        Commands::Info { graph } => show_info(&graph),
    }
}

fn load_store(dir: &Path) -> Result<GraphStore> {
    let start = Instant::now();
    let store = GraphStore::load(dir)
        .with_context(|| format!("failed to load graph from {}", dir.display()))?;
    info!(
        nodes = store.node_count(),
        edges = store.edge_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "graph loaded"
    );
    Ok(store)
}

fn load_ch(dir: &Path) -> Result<ChStorage> {
    let path = dir.join(CH_FILE);
    ChStorage::load(&path).with_context(|| {
        format!(
            "failed to load hierarchy from {} (run `contract` first)",
            path.display()
        )
    })
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, what: &str, line: usize) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let field = field.with_context(|| format!("line {}: missing {}", line, what))?;
    field
        .parse()
        .map_err(|e| anyhow::anyhow!("line {}: invalid {} '{}': {}", line, what, field, e))
}

fn parse_bool(field: Option<&str>, line: usize) -> Result<bool> {
    match field {
        Some("1") | Some("true") => Ok(true),
        Some("0") | Some("false") => Ok(false),
        Some(other) => bail!("line {}: invalid bidirectional flag '{}'", line, other),
        None => bail!("line {}: missing bidirectional flag", line),
    }
}

/// Read `n lat lon` and `e from to distance bidirectional` lines into `store`
pub fn read_text_graph(reader: impl BufRead, store: &GraphStore) -> Result<(usize, usize)> {
    let (mut nodes, mut edges) = (0, 0);
    for (i, line) in reader.lines().enumerate() {
        let line = line.context("failed to read text graph")?;
        let number = i + 1;
        let mut fields = line.split_whitespace();
        match fields.next() {
            None => continue,
            Some(tag) if tag.starts_with('#') => continue,
            Some("n") => {
                let lat = parse_field(fields.next(), "latitude", number)?;
                let lon = parse_field(fields.next(), "longitude", number)?;
                store.add_node(lat, lon);
                nodes += 1;
            }
            Some("e") => {
                let from: NodeId = parse_field(fields.next(), "from node", number)?;
                let to: NodeId = parse_field(fields.next(), "to node", number)?;
                let distance: f64 = parse_field(fields.next(), "distance", number)?;
                let bidirectional = parse_bool(fields.next(), number)?;
                store
                    .try_edge(from, to, distance, bidirectional)
                    .with_context(|| format!("line {}", number))?;
                edges += 1;
            }
            Some(other) => bail!("line {}: unknown entry '{}'", number, other),
        }
    }
    Ok((nodes, edges))
}

fn import(input: &Path, dir: &Path) -> Result<()> {
    let start = Instant::now();
    let file = File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let store = GraphStore::create(dir)?;
    let (nodes, edges) = read_text_graph(BufReader::new(file), &store)
        .with_context(|| format!("failed to import {}", input.display()))?;
    store.flush()?;

    println!("Imported {} node lines and {} edges into {}", nodes, edges, dir.display());
    println!("  Nodes:  {}", store.node_count());
    println!("  Edges:  {}", store.edge_count());
    println!("  Time:   {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn contract(dir: &Path, config: ChConfig) -> Result<()> {
    let store = load_store(dir)?;
    let prepare = PrepareContractionHierarchies::new(config.contraction, config.weighting);
    let (ch, stats) = prepare.run(&store)?;

    let path = dir.join(CH_FILE);
    ch.save(&path)?;
    stats.print();
    println!("\nHierarchy saved to {}", path.display());
    Ok(())
}

fn print_path(path: &RoutePath, elapsed: f64) {
    if !path.found {
        println!("No route found ({} + {} nodes visited)", path.visited_from, path.visited_to);
        return;
    }
    println!("Route found in {:.3}ms", elapsed * 1000.0);
    println!("  Weight:   {:.3}", path.weight);
    println!("  Distance: {:.0}m", path.distance);
    println!("  Time:     {:.1} minutes", path.time as f64 / 60_000.0);
    println!("  Edges:    {}", path.len());
    println!("  Visited:  {} + {} nodes", path.visited_from, path.visited_to);
}

fn route(dir: &Path, from: NodeId, to: NodeId, json: bool, dijkstra: bool) -> Result<()> {
    let store = load_store(dir)?;
    let ch = load_ch(dir)?;
    let weighting = weighting::from_config(ch.weighting());

    let start = Instant::now();
    let path = if dijkstra {
        let graph = BaseSearchGraph::new(&store, Arc::clone(&weighting))?;
        DijkstraBidirection::new(&graph).calc_path(from, to)?
    } else {
        let graph = ChSearchGraph::new(&store, &ch, weighting)?;
        ChBidirection::new(&graph).calc_path(from, to)?
    };
    let elapsed = start.elapsed().as_secs_f64();

    if json {
        println!("{}", serde_json::to_string_pretty(&path)?);
    } else {
        print_path(&path, elapsed);
    }
    Ok(())
}

fn validate(dir: &Path, queries: usize, seed: u64) -> Result<()> {
    let store = load_store(dir)?;
    let ch = load_ch(dir)?;
    let weighting = weighting::from_config(ch.weighting());
    let base = BaseSearchGraph::new(&store, Arc::clone(&weighting))?;
    let graph = ChSearchGraph::new(&store, &ch, weighting)?;

    let result = validate_ch(&base, &graph, queries, seed)?;
    result.print();
    if !result.is_valid() {
        bail!("{} of {} queries disagree with Dijkstra", result.incorrect, result.n_tests);
    }
    Ok(())
}

fn show_info(dir: &Path) -> Result<()> {
    let store = load_store(dir)?;
    let created = chrono::DateTime::from_timestamp_millis(store.creation_time_ms())
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());

    println!("\n=== GRAPH ===");
    println!("  Location:  {}", dir.display());
    println!("  Created:   {}", created);
    println!("  Nodes:     {}", store.node_count());
    println!("  Edges:     {}", store.edge_count());

    match ChStorage::load(&dir.join(CH_FILE)) {
        Ok(ch) => {
            println!("\n=== CONTRACTION HIERARCHY ===");
            let weighting = ch.weighting();
            println!("  Weighting: {} ({} km/h)", weighting.kind.as_str(), weighting.speed_kmh);
            println!("  Shortcuts: {}", ch.shortcut_count());
            println!("  Levels:    {}", ch.node_count());
        }
        Err(butterfly_ch::Error::MissingStorage(_)) => {
            println!("\n  No hierarchy yet (run `contract`)")
        }
        Err(e) => return Err(e).context("failed to load hierarchy"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_graph_is_read() {
        let text = "# tiny\nn 50.0 4.0\nn 50.1 4.1\n\nn 50.2 4.2\ne 0 1 120.5 1\ne 1 2 80 false\n";
        let store = GraphStore::new();
        let (nodes, edges) = read_text_graph(text.as_bytes(), &store).unwrap();
        assert_eq!((nodes, edges), (3, 2));
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.lat(2).unwrap(), 50.2);
        assert_eq!(store.outgoing(2).count(), 0);
        assert_eq!(store.outgoing(1).count(), 2);
    }

    #[test]
    fn bad_lines_name_their_number() {
        let store = GraphStore::new();
        let err = read_text_graph("n 1 2\ne 0 1 x 1\n".as_bytes(), &store).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
        assert!(read_text_graph("q 1\n".as_bytes(), &GraphStore::new()).is_err());
        assert!(read_text_graph("e 0 1 5 maybe\n".as_bytes(), &GraphStore::new()).is_err());
        let err = read_text_graph("e 0 1 -5 1\n".as_bytes(), &GraphStore::new()).unwrap_err();
        let text = format!("{:#}", err);
        assert!(text.contains("line 1") && text.contains("invalid distance"), "{}", text);
    }
}
