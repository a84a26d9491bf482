//! # Butterfly-ch CLI
//!
//! Command-line interface for the butterfly-ch library: import a graph,
//! contract it, query it and check the hierarchy against Dijkstra.

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod cli;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli::run(cli) {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}
