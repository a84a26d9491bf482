//! Edge arena - fixed-size edge records addressed by a typed index
//!
//! Every logical edge owns two consecutive records: record `2·id` lives in the
//! adjacency list of the first endpoint, record `2·id + 1` in the list of the
//! second one. All capacity and offset arithmetic lives here.

use crate::types::{EdgeFlags, EdgeId, NodeId};

/// Number of i32 words one record occupies in the persisted layout
pub const WORDS_PER_RECORD: usize = 5;

/// Persisted value of an absent link
pub const NO_LINK: i32 = -1;

/// Smallest allocation the arena or the node tables start with
pub const MIN_CAPACITY: usize = 10;

/// Geometric growth used by every growable table of the store
#[inline]
pub fn grown_capacity(required: usize) -> usize {
    MIN_CAPACITY.max((required as f64 * 1.5).round() as usize)
}

/// Typed index of a record inside the arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordIdx(u32);

impl RecordIdx {
    pub fn new(index: usize) -> Self {
        RecordIdx(index as u32)
    }

    /// Record of `edge` stored at its first (`side == 0`) or second endpoint
    pub fn of(edge: EdgeId, side: u32) -> Self {
        RecordIdx(edge.0 * 2 + (side & 1))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn edge(self) -> EdgeId {
        EdgeId(self.0 / 2)
    }

    /// The record of the same edge at the opposite endpoint
    #[inline]
    pub fn twin(self) -> RecordIdx {
        RecordIdx(self.0 ^ 1)
    }
}

/// One directed view of an edge, linked into its base node's adjacency list
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeRecord {
    /// Reserved word, always written as 0
    pub priority: i32,
    pub flags: EdgeFlags,
    pub distance: f32,
    pub adj_node: NodeId,
    pub next: Option<RecordIdx>,
}

impl EdgeRecord {
    pub fn new(adj_node: NodeId, distance: f32, flags: EdgeFlags) -> Self {
        Self {
            priority: 0,
            flags,
            distance,
            adj_node,
            next: None,
        }
    }

    fn to_words(self) -> [i32; WORDS_PER_RECORD] {
        [
            self.priority,
            self.flags.bits() as i32,
            self.distance.to_bits() as i32,
            self.adj_node as i32,
            self.next.map_or(NO_LINK, |r| r.0 as i32),
        ]
    }

    fn from_words(words: &[i32], n_records: usize) -> Result<Self, String> {
        let next = match words[4] {
            NO_LINK => None,
            link if link >= 0 && (link as usize) < n_records => Some(RecordIdx(link as u32)),
            link => return Err(format!("link {} outside arena of {} records", link, n_records)),
        };
        if words[3] < 0 {
            return Err(format!("negative adjacent node {}", words[3]));
        }
        Ok(Self {
            priority: words[0],
            flags: EdgeFlags::from_bits(words[1] as u8),
            distance: f32::from_bits(words[2] as u32),
            adj_node: words[3] as NodeId,
            next,
        })
    }
}

/// Append-only storage of edge records
#[derive(Debug, Clone, Default)]
pub struct EdgeArena {
    records: Vec<EdgeRecord>,
}

impl EdgeArena {
    pub fn with_capacity(records: usize) -> Self {
        Self {
            records: Vec::with_capacity(records),
        }
    }

    /// Number of records ever written; also the corruption bound for list walks
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    /// Number of logical edges (two records each)
    pub fn edge_count(&self) -> usize {
        self.records.len() / 2
    }

    pub fn ensure_capacity(&mut self, records: usize) {
        if records <= self.records.capacity() {
            return;
        }
        let target = grown_capacity(records);
        self.records.reserve_exact(target - self.records.len());
    }

    pub fn push(&mut self, record: EdgeRecord) -> RecordIdx {
        if self.records.len() == self.records.capacity() {
            self.ensure_capacity(self.records.len() + 1);
        }
        let idx = RecordIdx::new(self.records.len());
        self.records.push(record);
        idx
    }

    #[inline]
    pub fn get(&self, idx: RecordIdx) -> Option<&EdgeRecord> {
        self.records.get(idx.index())
    }

    pub fn set_next(&mut self, idx: RecordIdx, next: Option<RecordIdx>) -> bool {
        match self.records.get_mut(idx.index()) {
            Some(record) => {
                record.next = next;
                true
            }
            None => false,
        }
    }

    pub fn to_words(&self) -> Vec<i32> {
        let mut words = Vec::with_capacity(self.records.len() * WORDS_PER_RECORD);
        for record in &self.records {
            words.extend_from_slice(&record.to_words());
        }
        words
    }

    pub fn from_words(words: &[i32]) -> Result<Self, String> {
        if words.len() % WORDS_PER_RECORD != 0 {
            return Err(format!(
                "{} words is not a multiple of the record size {}",
                words.len(),
                WORDS_PER_RECORD
            ));
        }
        let n_records = words.len() / WORDS_PER_RECORD;
        if n_records % 2 != 0 {
            return Err(format!("odd record count {}", n_records));
        }
        let mut arena = Self::with_capacity(n_records);
        for chunk in words.chunks_exact(WORDS_PER_RECORD) {
            arena.records.push(EdgeRecord::from_words(chunk, n_records)?);
        }
        Ok(arena)
    }
}
