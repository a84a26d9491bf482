//! Edge cost functions
//!
//! A weighting turns an [`EdgeState`] plus a traversal direction into a
//! non-negative cost. A direction the edge does not allow costs `+∞`.

use std::fmt;
use std::sync::Arc;

use crate::config::{WeightingConfig, WeightingKind};
use crate::storage::EdgeState;

pub trait Weighting: Send + Sync + fmt::Debug {
    /// Cost of traversing `edge` from base to adjacent node, or backwards when `reverse`
    fn calc_weight(&self, edge: &EdgeState, reverse: bool) -> f64;

    /// Travel time in milliseconds, `u64::MAX` when the direction is not allowed
    fn calc_millis(&self, edge: &EdgeState, reverse: bool) -> u64;

    fn name(&self) -> &'static str;
}

#[inline]
fn allowed(edge: &EdgeState, reverse: bool) -> bool {
    if reverse {
        edge.is_backward()
    } else {
        edge.is_forward()
    }
}

#[inline]
fn millis_at(distance: f64, speed_mps: f64) -> u64 {
    (distance / speed_mps * 1000.0).round() as u64
}

/// Distance in meters
#[derive(Debug, Clone)]
pub struct ShortestWeighting {
    speed_mps: f64,
}

impl ShortestWeighting {
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_mps: speed_kmh / 3.6,
        }
    }
}

impl Weighting for ShortestWeighting {
    fn calc_weight(&self, edge: &EdgeState, reverse: bool) -> f64 {
        if allowed(edge, reverse) {
            edge.distance
        } else {
            f64::INFINITY
        }
    }

    fn calc_millis(&self, edge: &EdgeState, reverse: bool) -> u64 {
        if allowed(edge, reverse) {
            millis_at(edge.distance, self.speed_mps)
        } else {
            u64::MAX
        }
    }

    fn name(&self) -> &'static str {
        "shortest"
    }
}

/// Travel time in seconds at a constant speed
#[derive(Debug, Clone)]
pub struct FastestWeighting {
    speed_mps: f64,
}

impl FastestWeighting {
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_mps: speed_kmh / 3.6,
        }
    }
}

impl Weighting for FastestWeighting {
    fn calc_weight(&self, edge: &EdgeState, reverse: bool) -> f64 {
        if allowed(edge, reverse) {
            edge.distance / self.speed_mps
        } else {
            f64::INFINITY
        }
    }

    fn calc_millis(&self, edge: &EdgeState, reverse: bool) -> u64 {
        if allowed(edge, reverse) {
            millis_at(edge.distance, self.speed_mps)
        } else {
            u64::MAX
        }
    }

    fn name(&self) -> &'static str {
        "fastest"
    }
}

pub fn from_config(config: &WeightingConfig) -> Arc<dyn Weighting> {
    match config.kind {
        WeightingKind::Shortest => Arc::new(ShortestWeighting::new(config.speed_kmh)),
        WeightingKind::Fastest => Arc::new(FastestWeighting::new(config.speed_kmh)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeFlags, EdgeId};

    fn one_way(distance: f64) -> EdgeState {
        EdgeState {
            edge: EdgeId(0),
            base: 0,
            adj: 1,
            distance,
            flags: EdgeFlags::FORWARD,
        }
    }

    #[test]
    fn blocked_direction_is_infinite() {
        let w = ShortestWeighting::new(36.0);
        let e = one_way(100.0);
        assert_eq!(w.calc_weight(&e, false), 100.0);
        assert!(w.calc_weight(&e, true).is_infinite());
        assert_eq!(w.calc_weight(&e.reversed(), true), 100.0);
        assert_eq!(w.calc_millis(&e, false), 10_000);
        assert_eq!(w.calc_millis(&e, true), u64::MAX);
    }

    #[test]
    fn fastest_divides_by_speed() {
        let w = from_config(&WeightingConfig {
            kind: WeightingKind::Fastest,
            speed_kmh: 72.0,
        });
        assert_eq!(w.name(), "fastest");
        assert!((w.calc_weight(&one_way(200.0), false) - 10.0).abs() < 1e-9);
        assert_eq!(w.calc_millis(&one_way(200.0), false), 10_000);
    }
}
