//! Error types for the butterfly-ch library
//!
//! Only storage corruption and persistence failures are real errors. A witness
//! search running out of budget, blocked edges and unreachable targets are
//! normal outcomes and never surface here.

use std::path::PathBuf;

use crate::types::{EdgeId, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An adjacency list did not terminate within the number of records ever written
    #[error(
        "storage corruption: adjacency list of node {node} not terminated after {steps} steps \
         (arena holds {limit} records)"
    )]
    Corruption { node: NodeId, steps: usize, limit: usize },

    /// A record points outside the arena or to a node that does not exist
    #[error("storage corruption: {0}")]
    InvalidRecord(String),

    /// Reading or writing the backing location failed
    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted file exists but its content is not what we wrote
    #[error("malformed storage file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// `load` was pointed at a location that does not exist
    #[error("no graph storage found at {0}")]
    MissingStorage(PathBuf),

    #[error("node {0} does not exist")]
    InvalidNode(NodeId),

    #[error("edge {0} does not exist")]
    InvalidEdge(EdgeId),

    /// Edge distances must be finite and non-negative
    #[error("edge {a}-{b} has invalid distance {distance}")]
    InvalidWeight { a: NodeId, b: NodeId, distance: f64 },

    /// Invalid configuration or parameters
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the conditions that indicate a bug rather than bad input
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption { .. } | Error::InvalidRecord(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_is_classified() {
        let err = Error::Corruption {
            node: 3,
            steps: 11,
            limit: 10,
        };
        assert!(err.is_corruption());
        assert!(err.to_string().contains("node 3"));

        let io = Error::io("/tmp/x", std::io::Error::other("boom"));
        assert!(!io.is_corruption());
        assert!(io.to_string().contains("/tmp/x"));
    }
}
