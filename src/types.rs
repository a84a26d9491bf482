//! Shared identifiers and small value types

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense, 0-based node id
pub type NodeId = u32;

/// Sentinel used for "no node" in flat arrays
pub const NO_NODE: NodeId = u32::MAX;

/// Edge id. Base edges occupy `0..num_base_edges`, shortcuts follow them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Two direction bits as seen from an edge's base node
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EdgeFlags(u8);

impl EdgeFlags {
    pub const NONE: EdgeFlags = EdgeFlags(0);
    pub const FORWARD: EdgeFlags = EdgeFlags(1);
    pub const BACKWARD: EdgeFlags = EdgeFlags(2);
    pub const BOTH: EdgeFlags = EdgeFlags(3);

    /// Rebuild flags from their persisted form; bits above the direction mask are dropped
    pub fn from_bits(bits: u8) -> Self {
        EdgeFlags(bits & 3)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Traversable from the base node to the adjacent node
    #[inline]
    pub fn is_forward(self) -> bool {
        self.0 & 1 != 0
    }

    /// Traversable from the adjacent node to the base node
    #[inline]
    pub fn is_backward(self) -> bool {
        self.0 & 2 != 0
    }

    pub fn is_both(self) -> bool {
        self.0 == 3
    }

    /// The same edge seen from its other end
    pub fn reversed(self) -> Self {
        EdgeFlags(((self.0 & 1) << 1) | ((self.0 & 2) >> 1))
    }

    pub fn union(self, other: EdgeFlags) -> Self {
        EdgeFlags(self.0 | other.0)
    }
}

impl fmt::Debug for EdgeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.0 {
            0 => "none",
            1 => "fwd",
            2 => "bwd",
            _ => "both",
        };
        f.write_str(s)
    }
}

/// Queue key that pops the smallest weight first.
///
/// `priority_queue::PriorityQueue` is a max-queue and needs a total order, so
/// weights are compared with `total_cmp` and reversed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinWeight(pub f64);

impl Eq for MinWeight {}

impl PartialOrd for MinWeight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MinWeight {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.total_cmp(&self.0)
    }
}
