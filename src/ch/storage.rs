//! Contraction hierarchy output: node levels plus shortcut edges
//!
//! Shortcuts are numbered after the base edges of the graph store, so CH edge
//! `num_base_edges + k` is shortcut `k`. A shortcut always goes from its lower
//! level endpoint (`from`) to its higher level endpoint (`to`); its flags are
//! relative to `from`. `skip1` is adjacent to `from`, `skip2` to `to`.

use serde::Serialize;

use crate::config::WeightingConfig;
use crate::error::{Error, Result};
use crate::types::{EdgeFlags, EdgeId, NodeId};

pub const NO_LEVEL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Shortcut {
    pub from: NodeId,
    pub to: NodeId,
    pub flags: EdgeFlags,
    pub weight: f64,
    /// Travel time from `from` to `to` in milliseconds
    pub time: u64,
    pub skip1: EdgeId,
    pub skip2: EdgeId,
    /// Number of base edges this shortcut stands for
    pub orig_count: u32,
}

impl Shortcut {
    /// The endpoint opposite to `node`
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if node == self.from {
            Some(self.to)
        } else if node == self.to {
            Some(self.from)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChStorage {
    pub(crate) base_edges: u32,
    pub(crate) levels: Vec<u32>,
    pub(crate) shortcuts: Vec<Shortcut>,
    pub(crate) weighting: WeightingConfig,
}

impl ChStorage {
    pub fn node_count(&self) -> usize {
        self.levels.len()
    }

    pub fn base_edge_count(&self) -> usize {
        self.base_edges as usize
    }

    pub fn shortcut_count(&self) -> usize {
        self.shortcuts.len()
    }

    /// All CH edges: base edges followed by shortcuts
    pub fn edge_count(&self) -> usize {
        self.base_edge_count() + self.shortcut_count()
    }

    pub fn level(&self, node: NodeId) -> u32 {
        self.levels.get(node as usize).copied().unwrap_or(NO_LEVEL)
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    pub fn shortcuts(&self) -> &[Shortcut] {
        &self.shortcuts
    }

    pub fn is_shortcut(&self, edge: EdgeId) -> bool {
        edge.0 >= self.base_edges
    }

    pub fn shortcut(&self, edge: EdgeId) -> Option<&Shortcut> {
        edge.0
            .checked_sub(self.base_edges)
            .and_then(|k| self.shortcuts.get(k as usize))
    }

    /// Weighting the hierarchy was prepared with
    pub fn weighting(&self) -> &WeightingConfig {
        &self.weighting
    }

    /// Check levels form a permutation and every shortcut only skips older edges
    pub fn validate(&self) -> Result<()> {
        let n = self.levels.len();
        let mut seen = vec![false; n];
        for (node, &level) in self.levels.iter().enumerate() {
            if level as usize >= n || seen[level as usize] {
                return Err(Error::InvalidRecord(format!(
                    "node {} has invalid or duplicate level {}",
                    node, level
                )));
            }
            seen[level as usize] = true;
        }

        for (k, sc) in self.shortcuts.iter().enumerate() {
            let id = self.base_edges + k as u32;
            if sc.from as usize >= n || sc.to as usize >= n {
                return Err(Error::InvalidEdge(EdgeId(id)));
            }
            if self.levels[sc.from as usize] >= self.levels[sc.to as usize] {
                return Err(Error::InvalidRecord(format!(
                    "shortcut {} does not lead upwards ({} -> {})",
                    id, sc.from, sc.to
                )));
            }
            if sc.skip1.0 >= id || sc.skip2.0 >= id {
                return Err(Error::InvalidRecord(format!(
                    "shortcut {} skips edges {} and {} that are not older",
                    id, sc.skip1, sc.skip2
                )));
            }
        }
        Ok(())
    }
}

/// Write side used while contracting
#[derive(Debug)]
pub struct ChBuilder {
    storage: ChStorage,
}

impl ChBuilder {
    pub fn new(node_count: usize, base_edges: usize, weighting: WeightingConfig) -> Self {
        Self {
            storage: ChStorage {
                base_edges: base_edges as u32,
                levels: vec![NO_LEVEL; node_count],
                shortcuts: Vec::new(),
                weighting,
            },
        }
    }

    /// Append a shortcut; returns its index `k` (CH edge id `base_edges + k`)
    #[allow(clippy::too_many_arguments)]
    pub fn add_shortcut(
        &mut self,
        from: NodeId,
        to: NodeId,
        flags: EdgeFlags,
        weight: f64,
        skip1: EdgeId,
        skip2: EdgeId,
        time: u64,
        orig_count: u32,
    ) -> u32 {
        let k = self.storage.shortcuts.len() as u32;
        self.storage.shortcuts.push(Shortcut {
            from,
            to,
            flags,
            weight,
            time,
            skip1,
            skip2,
            orig_count,
        });
        k
    }

    pub fn shortcut_edge_id(&self, k: u32) -> EdgeId {
        EdgeId(self.storage.base_edges + k)
    }

    pub fn shortcut(&self, k: u32) -> Option<&Shortcut> {
        self.storage.shortcuts.get(k as usize)
    }

    /// Make shortcut `k` traversable in both directions
    pub fn merge_backward(&mut self, k: u32) {
        if let Some(sc) = self.storage.shortcuts.get_mut(k as usize) {
            sc.flags = sc.flags.union(EdgeFlags::BACKWARD);
        }
    }

    pub fn set_level(&mut self, node: NodeId, level: u32) -> Result<()> {
        match self.storage.levels.get_mut(node as usize) {
            Some(slot) => {
                *slot = level;
                Ok(())
            }
            None => Err(Error::InvalidNode(node)),
        }
    }

    pub fn shortcut_count(&self) -> usize {
        self.storage.shortcuts.len()
    }

    /// Rewrite every skipped-edge reference through `map`
    pub fn replace_skipped_edges(&mut self, map: impl Fn(EdgeId) -> Option<EdgeId>) -> Result<()> {
        for sc in &mut self.storage.shortcuts {
            sc.skip1 = map(sc.skip1).ok_or(Error::InvalidEdge(sc.skip1))?;
            sc.skip2 = map(sc.skip2).ok_or(Error::InvalidEdge(sc.skip2))?;
        }
        Ok(())
    }

    pub fn build(self) -> Result<ChStorage> {
        self.storage.validate()?;
        Ok(self.storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ChBuilder {
        ChBuilder::new(3, 2, WeightingConfig::default())
    }

    #[test]
    fn shortcut_ids_follow_base_edges() {
        let mut b = builder();
        let k = b.add_shortcut(0, 2, EdgeFlags::BOTH, 5.0, EdgeId(0), EdgeId(1), 100, 2);
        assert_eq!(k, 0);
        assert_eq!(b.shortcut_edge_id(k), EdgeId(2));
        for (node, level) in [(1, 0), (0, 1), (2, 2)] {
            b.set_level(node, level).unwrap();
        }
        let ch = b.build().unwrap();
        assert_eq!(ch.edge_count(), 3);
        assert!(ch.is_shortcut(EdgeId(2)));
        assert!(!ch.is_shortcut(EdgeId(1)));
        assert_eq!(ch.shortcut(EdgeId(2)).unwrap().other_end(2), Some(0));
        assert!(ch.shortcut(EdgeId(1)).is_none());
    }

    #[test]
    fn skipped_edges_are_remapped() {
        let mut b = builder();
        b.add_shortcut(0, 2, EdgeFlags::FORWARD, 5.0, EdgeId(10), EdgeId(1), 0, 2);
        b.replace_skipped_edges(|e| if e.0 == 10 { Some(EdgeId(0)) } else { Some(e) })
            .unwrap();
        assert_eq!(b.shortcut(0).unwrap().skip1, EdgeId(0));
        assert!(b.replace_skipped_edges(|_| None).is_err());
    }

    #[test]
    fn incomplete_levels_are_rejected() {
        let mut b = builder();
        b.set_level(0, 0).unwrap();
        assert!(b.set_level(7, 1).is_err());
        assert!(b.build().is_err());
    }
}
