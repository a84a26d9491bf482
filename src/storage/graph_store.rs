//! Concurrent node/edge store with singly linked adjacency lists
//!
//! All mutable state sits behind one `parking_lot::RwLock`. Readers share the
//! lock, `add_node`/`edge`/`mark_deleted` take it exclusively, so no reader
//! ever observes a half-linked record. Readers lock recursively: a getter
//! called while an [`EdgeIter`] is alive never queues behind a waiting writer.

use std::path::{Path, PathBuf};

use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use super::arena::{grown_capacity, EdgeArena, EdgeRecord, RecordIdx, NO_LINK};
use super::persist::{self, Settings};
use crate::error::{Error, Result};
use crate::types::{EdgeFlags, EdgeId, NodeId};

pub const LATS_FILE: &str = "lats";
pub const LONS_FILE: &str = "lons";
pub const EDGES_FILE: &str = "edges";
pub const REFS_FILE: &str = "refs";
pub const SETTINGS_FILE: &str = "settings";

/// One edge as seen from `base`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeState {
    pub edge: EdgeId,
    pub base: NodeId,
    pub adj: NodeId,
    pub distance: f64,
    /// Direction bits relative to `base`
    pub flags: EdgeFlags,
}

impl EdgeState {
    #[inline]
    pub fn is_forward(&self) -> bool {
        self.flags.is_forward()
    }

    #[inline]
    pub fn is_backward(&self) -> bool {
        self.flags.is_backward()
    }

    /// The same edge seen from the adjacent node
    pub fn reversed(&self) -> EdgeState {
        EdgeState {
            edge: self.edge,
            base: self.adj,
            adj: self.base,
            distance: self.distance,
            flags: self.flags.reversed(),
        }
    }
}

#[derive(Debug)]
struct StoreInner {
    lats: Vec<f32>,
    lons: Vec<f32>,
    heads: Vec<Option<RecordIdx>>,
    /// Last record of each list; rebuilt on load, never persisted
    tails: Vec<Option<RecordIdx>>,
    arena: EdgeArena,
    deleted: FxHashSet<NodeId>,
    creation_time_ms: i64,
}

impl StoreInner {
    fn empty() -> Self {
        Self {
            lats: Vec::new(),
            lons: Vec::new(),
            heads: Vec::new(),
            tails: Vec::new(),
            arena: EdgeArena::default(),
            deleted: FxHashSet::default(),
            creation_time_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn node_count(&self) -> usize {
        self.lats.len()
    }

    fn ensure_node_capacity(&mut self, nodes: usize) {
        if nodes <= self.lats.capacity() {
            return;
        }
        let extra = grown_capacity(nodes) - self.lats.len();
        self.lats.reserve_exact(extra);
        self.lons.reserve_exact(extra);
        self.heads.reserve_exact(extra);
        self.tails.reserve_exact(extra);
    }

    /// Grow the node tables so `node` is addressable
    fn ensure_node(&mut self, node: NodeId) {
        let required = node as usize + 1;
        if required <= self.node_count() {
            return;
        }
        self.ensure_node_capacity(required);
        self.lats.resize(required, 0.0);
        self.lons.resize(required, 0.0);
        self.heads.resize(required, None);
        self.tails.resize(required, None);
    }

    fn link_at_tail(&mut self, node: NodeId, record: RecordIdx) {
        let n = node as usize;
        match self.tails[n] {
            Some(tail) => {
                self.arena.set_next(tail, Some(record));
            }
            None => self.heads[n] = Some(record),
        }
        self.tails[n] = Some(record);
    }

    /// Walk a list to its end, failing once it is longer than the arena
    fn find_tail(&self, node: NodeId) -> Result<Option<RecordIdx>> {
        let limit = self.arena.len();
        let mut cursor = self.heads[node as usize];
        let mut tail = None;
        let mut steps = 0usize;
        while let Some(idx) = cursor {
            steps += 1;
            if steps > limit {
                return Err(Error::Corruption { node, steps, limit });
            }
            let record = self.arena.get(idx).ok_or_else(|| {
                Error::InvalidRecord(format!(
                    "record {} of node {} outside arena",
                    idx.index(),
                    node
                ))
            })?;
            tail = Some(idx);
            cursor = record.next;
        }
        Ok(tail)
    }

    fn state_of(&self, idx: RecordIdx) -> Result<EdgeState> {
        let record = self
            .arena
            .get(idx)
            .ok_or(Error::InvalidEdge(idx.edge()))?;
        let twin = self
            .arena
            .get(idx.twin())
            .ok_or(Error::InvalidEdge(idx.edge()))?;
        Ok(EdgeState {
            edge: idx.edge(),
            base: twin.adj_node,
            adj: record.adj_node,
            distance: record.distance as f64,
            flags: record.flags,
        })
    }
}

/// Index-addressed graph storage shared between one writer and many readers
#[derive(Debug)]
pub struct GraphStore {
    location: Option<PathBuf>,
    inner: RwLock<StoreInner>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// In-memory store without a backing directory
    pub fn new() -> Self {
        Self {
            location: None,
            inner: RwLock::new(StoreInner::empty()),
        }
    }

    /// Empty store that persists into `dir`
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        debug!(dir = %dir.display(), "created graph store location");
        Ok(Self {
            location: Some(dir.to_path_buf()),
            inner: RwLock::new(StoreInner::empty()),
        })
    }

    /// Load a store previously written by [`GraphStore::save`]
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::MissingStorage(dir.to_path_buf()));
        }

        let settings = persist::read_settings(&dir.join(SETTINGS_FILE))?;
        let lats = persist::read_floats(&dir.join(LATS_FILE))?;
        let lons = persist::read_floats(&dir.join(LONS_FILE))?;
        let refs = persist::read_ints(&dir.join(REFS_FILE))?;
        let edges_path = dir.join(EDGES_FILE);
        let words = persist::read_ints(&edges_path)?;

        if settings.node_count < 0 {
            return Err(Error::malformed(dir.join(SETTINGS_FILE), "negative node count"));
        }
        let n = settings.node_count as usize;
        let lengths = [
            (LATS_FILE, lats.len()),
            (LONS_FILE, lons.len()),
            (REFS_FILE, refs.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(Error::malformed(
                    dir.join(name),
                    format!("{} entries but settings declare {} nodes", len, n),
                ));
            }
        }

        let arena = EdgeArena::from_words(&words).map_err(|r| Error::malformed(&edges_path, r))?;
        if let Some(bad) = (0..arena.len())
            .filter_map(|i| arena.get(RecordIdx::new(i)))
            .find(|r| r.adj_node as usize >= n)
        {
            return Err(Error::malformed(
                &edges_path,
                format!("record points to node {} of {}", bad.adj_node, n),
            ));
        }

        let mut heads = Vec::with_capacity(n);
        for (node, &head) in refs.iter().enumerate() {
            heads.push(match head {
                NO_LINK => None,
                h if h >= 0 && (h as usize) < arena.len() => Some(RecordIdx::new(h as usize)),
                h => {
                    return Err(Error::malformed(
                        dir.join(REFS_FILE),
                        format!("node {} head {} outside arena", node, h),
                    ))
                }
            });
        }

        let mut inner = StoreInner {
            lats,
            lons,
            heads,
            tails: vec![None; n],
            arena,
            deleted: FxHashSet::default(),
            creation_time_ms: settings.creation_time_ms,
        };
        for node in 0..n as NodeId {
            inner.tails[node as usize] = inner.find_tail(node)?;
        }

        info!(
            dir = %dir.display(),
            nodes = n,
            edges = inner.arena.edge_count(),
            "loaded graph store"
        );
        Ok(Self {
            location: Some(dir.to_path_buf()),
            inner: RwLock::new(inner),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read_recursive()
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Pre-size node tables to `nodes` and the edge arena to `nodes / 4` edges
    pub fn ensure_capacity(&self, nodes: usize) {
        let mut inner = self.inner.write();
        inner.ensure_node_capacity(nodes);
        inner.arena.ensure_capacity(nodes / 4 * 2);
    }

    pub fn add_node(&self, lat: f32, lon: f32) -> NodeId {
        let mut inner = self.inner.write();
        let id = inner.node_count() as NodeId;
        inner.ensure_node(id);
        inner.lats[id as usize] = lat;
        inner.lons[id as usize] = lon;
        id
    }

    /// Set coordinates, growing the node tables when `node` is new
    pub fn set_node(&self, node: NodeId, lat: f32, lon: f32) {
        let mut inner = self.inner.write();
        inner.ensure_node(node);
        inner.lats[node as usize] = lat;
        inner.lons[node as usize] = lon;
    }

    pub fn node_count(&self) -> usize {
        self.read().node_count()
    }

    pub fn lat(&self, node: NodeId) -> Result<f32> {
        self.read()
            .lats
            .get(node as usize)
            .copied()
            .ok_or(Error::InvalidNode(node))
    }

    pub fn lon(&self, node: NodeId) -> Result<f32> {
        self.read()
            .lons
            .get(node as usize)
            .copied()
            .ok_or(Error::InvalidNode(node))
    }

    /// Append an edge between `a` and `b`; a one-way edge is traversable `a → b`.
    ///
    /// `distance` must be finite and non-negative, use [`GraphStore::try_edge`]
    /// for unchecked input.
    pub fn edge(&self, a: NodeId, b: NodeId, distance: f64, bidirectional: bool) -> EdgeId {
        debug_assert!(
            valid_distance(distance),
            "edge {}-{} has invalid distance {}",
            a,
            b,
            distance
        );
        let mut inner = self.inner.write();
        inner.ensure_node(a.max(b));

        let flags = if bidirectional {
            EdgeFlags::BOTH
        } else {
            EdgeFlags::FORWARD
        };
        let at_a = inner.arena.push(EdgeRecord::new(b, distance as f32, flags));
        let at_b = inner.arena.push(EdgeRecord::new(a, distance as f32, flags.reversed()));
        inner.link_at_tail(a, at_a);
        inner.link_at_tail(b, at_b);

        let edge = at_a.edge();
        debug_assert_eq!(at_b.edge(), edge);
        edge
    }

    /// Like [`GraphStore::edge`], rejecting negative and non-finite distances
    pub fn try_edge(
        &self,
        a: NodeId,
        b: NodeId,
        distance: f64,
        bidirectional: bool,
    ) -> Result<EdgeId> {
        if !valid_distance(distance) {
            return Err(Error::InvalidWeight { a, b, distance });
        }
        Ok(self.edge(a, b, distance, bidirectional))
    }

    pub fn edge_count(&self) -> usize {
        self.read().arena.edge_count()
    }

    /// Lazily iterate the edges of `node` matching the requested directions.
    ///
    /// The iterator holds the read lock until dropped: do not call a mutating
    /// method on the same store while one is alive. Getters are fine.
    pub fn edges_of(&self, node: NodeId, want_incoming: bool, want_outgoing: bool) -> EdgeIter<'_> {
        let guard = self.read();
        let head = guard.heads.get(node as usize).copied().flatten();
        EdgeIter {
            guard,
            node,
            head,
            cursor: head,
            want_incoming,
            want_outgoing,
            steps: 0,
            done: false,
        }
    }

    pub fn outgoing(&self, node: NodeId) -> EdgeIter<'_> {
        self.edges_of(node, false, true)
    }

    pub fn incoming(&self, node: NodeId) -> EdgeIter<'_> {
        self.edges_of(node, true, false)
    }

    /// State of `edge` as seen from one of its endpoints
    pub fn edge_state(&self, edge: EdgeId, base: NodeId) -> Result<EdgeState> {
        let inner = self.read();
        if edge.index() >= inner.arena.edge_count() {
            return Err(Error::InvalidEdge(edge));
        }
        let first = inner.state_of(RecordIdx::of(edge, 0))?;
        if first.base == base {
            Ok(first)
        } else if first.adj == base {
            inner.state_of(RecordIdx::of(edge, 1))
        } else {
            Err(Error::InvalidNode(base))
        }
    }

    /// Every edge once, seen from its first endpoint, under one read lock
    pub fn base_edges(&self) -> Result<Vec<EdgeState>> {
        let inner = self.read();
        let n = inner.node_count();
        let mut out = Vec::with_capacity(inner.arena.edge_count());
        for e in 0..inner.arena.edge_count() {
            let state = inner.state_of(RecordIdx::of(EdgeId(e as u32), 0))?;
            if state.base as usize >= n || state.adj as usize >= n {
                return Err(Error::InvalidRecord(format!(
                    "edge {} connects {} and {} but the store has {} nodes",
                    e, state.base, state.adj, n
                )));
            }
            out.push(state);
        }
        Ok(out)
    }

    pub fn mark_deleted(&self, node: NodeId) -> Result<()> {
        let mut inner = self.inner.write();
        if node as usize >= inner.node_count() {
            return Err(Error::InvalidNode(node));
        }
        inner.deleted.insert(node);
        Ok(())
    }

    pub fn is_deleted(&self, node: NodeId) -> bool {
        self.read().deleted.contains(&node)
    }

    pub fn deleted_count(&self) -> usize {
        self.read().deleted.len()
    }

    /// Compaction pass. Deleted nodes are counted and reported; their space is
    /// not reclaimed and ids stay stable.
    pub fn optimize(&self) -> usize {
        Self::report_deleted(&self.read())
    }

    fn report_deleted(inner: &StoreInner) -> usize {
        let deleted = inner.deleted.len();
        if deleted > 0 {
            info!(deleted, nodes = inner.node_count(), "optimize: deleted nodes kept in place");
        }
        deleted
    }

    pub fn creation_time_ms(&self) -> i64 {
        self.read().creation_time_ms
    }

    /// Persist into the store's own directory; a no-op for in-memory stores
    pub fn save(&self) -> Result<()> {
        match &self.location {
            Some(dir) => self.save_to(dir),
            None => {
                debug!("in-memory graph store, nothing to save");
                Ok(())
            }
        }
    }

    pub fn save_to(&self, dir: &Path) -> Result<()> {
        Self::write_files(&self.read(), dir)
    }

    fn write_files(inner: &StoreInner, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let n = inner.node_count();

        persist::write_floats(&dir.join(LATS_FILE), &inner.lats)?;
        persist::write_floats(&dir.join(LONS_FILE), &inner.lons)?;
        persist::write_ints(&dir.join(EDGES_FILE), &inner.arena.to_words())?;
        let refs: Vec<i32> = inner
            .heads
            .iter()
            .map(|h| h.map_or(NO_LINK, |r| r.index() as i32))
            .collect();
        persist::write_ints(&dir.join(REFS_FILE), &refs)?;
        persist::write_settings(
            &dir.join(SETTINGS_FILE),
            Settings {
                node_count: n as i32,
                creation_time_ms: inner.creation_time_ms,
            },
        )?;

        info!(
            dir = %dir.display(),
            nodes = n,
            edges = inner.arena.edge_count(),
            "saved graph store"
        );
        Ok(())
    }

    /// Optimize, then save, all under one read lock so every file shows the
    /// same snapshot
    pub fn flush(&self) -> Result<()> {
        let inner = self.read();
        Self::report_deleted(&inner);
        match &self.location {
            Some(dir) => Self::write_files(&inner, dir),
            None => {
                debug!("in-memory graph store, nothing to save");
                Ok(())
            }
        }
    }

    #[cfg(test)]
    fn corrupt_link(&self, from: RecordIdx, to: RecordIdx) {
        self.inner.write().arena.set_next(from, Some(to));
    }
}

fn valid_distance(distance: f64) -> bool {
    distance.is_finite() && distance >= 0.0
}

/// Cursor over one node's adjacency list; holds the store's read lock
pub struct EdgeIter<'a> {
    guard: RwLockReadGuard<'a, StoreInner>,
    node: NodeId,
    head: Option<RecordIdx>,
    cursor: Option<RecordIdx>,
    want_incoming: bool,
    want_outgoing: bool,
    steps: usize,
    done: bool,
}

impl EdgeIter<'_> {
    /// Start over from the head of the list
    pub fn restart(&mut self) {
        self.cursor = self.head;
        self.steps = 0;
        self.done = false;
    }

    pub fn base(&self) -> NodeId {
        self.node
    }
}

impl Iterator for EdgeIter<'_> {
    type Item = Result<EdgeState>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let limit = self.guard.arena.len();
        while let Some(idx) = self.cursor {
            self.steps += 1;
            if self.steps > limit {
                self.done = true;
                return Some(Err(Error::Corruption {
                    node: self.node,
                    steps: self.steps,
                    limit,
                }));
            }
            let Some(record) = self.guard.arena.get(idx) else {
                self.done = true;
                return Some(Err(Error::InvalidRecord(format!(
                    "record {} of node {} outside arena",
                    idx.index(),
                    self.node
                ))));
            };
            self.cursor = record.next;

            let matches = (self.want_outgoing && record.flags.is_forward())
                || (self.want_incoming && record.flags.is_backward());
            if matches {
                return Some(Ok(EdgeState {
                    edge: idx.edge(),
                    base: self.node,
                    adj: record.adj_node,
                    distance: record.distance as f64,
                    flags: record.flags,
                }));
            }
        }
        self.done = true;
        None
    }
}
