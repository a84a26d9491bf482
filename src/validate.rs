//! Validation of CH correctness
//!
//! Compares CH query weights against one-directional Dijkstra on the base
//! graph for random node pairs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::routing::{BaseSearchGraph, ChBidirection, ChSearchGraph, Dijkstra, SearchGraph};
use crate::types::NodeId;

/// Largest number of mismatches kept for the report
const MAX_SAMPLE_ERRORS: usize = 10;

/// Relative tolerance for comparing summed float weights
const WEIGHT_EPSILON: f64 = 1e-6;

fn same_weight(a: f64, b: f64) -> bool {
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= WEIGHT_EPSILON * a.abs().max(1.0)
}

/// Random `(source, target)` pairs, reproducible for a seed
pub fn random_queries(node_count: usize, n_tests: usize, seed: u64) -> Vec<(NodeId, NodeId)> {
    if node_count == 0 {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let n = node_count as NodeId;
    (0..n_tests)
        .map(|_| (rng.random_range(0..n), rng.random_range(0..n)))
        .collect()
}

/// Validate CH queries against Dijkstra, running the pairs in parallel
pub fn validate_ch(
    base: &BaseSearchGraph,
    ch: &ChSearchGraph,
    n_tests: usize,
    seed: u64,
) -> Result<ValidationResult> {
    let queries = random_queries(ch.node_count(), n_tests, seed);
    info!(queries = queries.len(), seed, "validating CH against Dijkstra");

    let outcomes = queries
        .par_iter()
        .map(|&(source, target)| {
            let dijkstra_weight = Dijkstra::new(base).calc_weight(source, target)?;
            let ch_weight = ChBidirection::new(ch).calc_path(source, target)?.weight;
            Ok(ValidationError {
                source,
                target,
                dijkstra_weight,
                ch_weight,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut result = ValidationResult {
        n_tests: outcomes.len(),
        ..ValidationResult::default()
    };
    for outcome in outcomes {
        if same_weight(outcome.dijkstra_weight, outcome.ch_weight) {
            result.correct += 1;
            if outcome.dijkstra_weight.is_infinite() {
                result.unreachable_both += 1;
            }
        } else {
            result.incorrect += 1;
            if result.errors.len() < MAX_SAMPLE_ERRORS {
                result.errors.push(outcome);
            }
        }
    }
    info!(correct = result.correct, incorrect = result.incorrect, "validation done");
    Ok(result)
}

#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    pub n_tests: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unreachable_both: usize,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn print(&self) {
        let pct = |count: usize| count as f64 * 100.0 / self.n_tests.max(1) as f64;
        println!("\n=== VALIDATION RESULTS ===");
        println!("  Total tests:     {}", self.n_tests);
        println!("  Correct:         {} ({:.2}%)", self.correct, pct(self.correct));
        println!("  Incorrect:       {} ({:.2}%)", self.incorrect, pct(self.incorrect));
        println!("  Unreachable:     {}", self.unreachable_both);

        if !self.errors.is_empty() {
            println!("\n  Sample errors:");
            for err in &self.errors {
                println!(
                    "    {} → {}: Dijkstra={}, CH={}",
                    err.source, err.target, err.dijkstra_weight, err.ch_weight
                );
            }
        }

        if self.is_valid() {
            println!("\n  ✅ ALL TESTS PASSED!");
        } else {
            println!("\n  ❌ VALIDATION FAILED!");
        }
    }

    pub fn is_valid(&self) -> bool {
        self.incorrect == 0
    }
}

/// A pair both searches were asked for; kept when the weights differ
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub source: NodeId,
    pub target: NodeId,
    pub dijkstra_weight: f64,
    pub ch_weight: f64,
}
