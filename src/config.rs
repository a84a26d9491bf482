//! Preparation and weighting configuration
//!
//! ```toml
//! [contraction]
//! edge_difference_weight = 10.0
//! original_edges_count_weight = 1.0
//! log_messages_percent = 20.0
//! lazy_updates = true
//! # witness_budget = 500
//!
//! [weighting]
//! kind = "fastest"
//! speed_kmh = 50.0
//! ```
//!
//! Missing fields take their defaults. Values are checked by [`ChConfig::validate`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChConfig {
    pub contraction: ContractionConfig,
    pub weighting: WeightingConfig,
}

/// Node ordering and contraction knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractionConfig {
    /// Factor on `shortcuts - degree` in the node priority
    #[serde(default = "default_edge_difference_weight")]
    pub edge_difference_weight: f64,

    /// Factor on the summed original-edge count of the shortcuts
    #[serde(default = "default_original_edges_count_weight")]
    pub original_edges_count_weight: f64,

    /// Log progress every this many percent of contracted nodes; 0 disables
    #[serde(default = "default_log_messages_percent")]
    pub log_messages_percent: f64,

    /// Recompute a polled node's priority before contracting it
    #[serde(default = "default_lazy_updates")]
    pub lazy_updates: bool,

    /// Fixed settled-node budget per witness search; unset derives it from
    /// the mean degree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_budget: Option<usize>,
}

fn default_edge_difference_weight() -> f64 {
    10.0
}

fn default_original_edges_count_weight() -> f64 {
    1.0
}

fn default_log_messages_percent() -> f64 {
    20.0
}

fn default_lazy_updates() -> bool {
    true
}

impl Default for ContractionConfig {
    fn default() -> Self {
        Self {
            edge_difference_weight: default_edge_difference_weight(),
            original_edges_count_weight: default_original_edges_count_weight(),
            log_messages_percent: default_log_messages_percent(),
            lazy_updates: default_lazy_updates(),
            witness_budget: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightingKind {
    /// Weight is the edge distance in meters
    #[default]
    Shortest,
    /// Weight is the travel time in seconds at a constant speed
    Fastest,
}

impl WeightingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightingKind::Shortest => "shortest",
            WeightingKind::Fastest => "fastest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightingConfig {
    #[serde(default)]
    pub kind: WeightingKind,

    /// Speed used for travel times, and for the weight of `fastest`
    #[serde(default = "default_speed_kmh")]
    pub speed_kmh: f64,
}

fn default_speed_kmh() -> f64 {
    50.0
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            kind: WeightingKind::default(),
            speed_kmh: default_speed_kmh(),
        }
    }
}

impl ChConfig {
    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read '{}': {}", path.display(), e)))?;
        let config = Self::from_toml(&contents)
            .map_err(|e| Error::Config(format!("{} (in '{}')", e, path.display())))?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| Error::Config(format!("failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.contraction;
        if !c.edge_difference_weight.is_finite() || !c.original_edges_count_weight.is_finite() {
            return Err(Error::Config("priority weights must be finite".to_string()));
        }
        if !(0.0..=100.0).contains(&c.log_messages_percent) {
            return Err(Error::Config(format!(
                "log_messages_percent must be within 0..=100, got {}",
                c.log_messages_percent
            )));
        }
        let speed = self.weighting.speed_kmh;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::Config(format!("speed_kmh must be positive, got {}", speed)));
        }
        Ok(())
    }
}
