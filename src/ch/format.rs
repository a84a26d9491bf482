//! ch.bin format - node levels and shortcut records of a prepared hierarchy
//!
//! Layout: 40-byte header, `u32` level per node, 44-byte shortcut records,
//! CRC-64 footer over everything before it. All integers little-endian.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::storage::{ChStorage, Shortcut};
use crate::config::{WeightingConfig, WeightingKind};
use crate::error::{Error, Result};
use crate::storage::checksum::{verify_footer, ChecksumWriter};
use crate::storage::persist::body_len;
use crate::types::{EdgeFlags, EdgeId};

pub const CH_FILE: &str = "ch.bin";

const MAGIC: u32 = 0x4243_4348; // "BCCH"
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 40;
const SHORTCUT_SIZE: usize = 44;

fn kind_to_byte(kind: WeightingKind) -> u8 {
    match kind {
        WeightingKind::Shortest => 0,
        WeightingKind::Fastest => 1,
    }
}

fn kind_from_byte(byte: u8) -> Option<WeightingKind> {
    match byte {
        0 => Some(WeightingKind::Shortest),
        1 => Some(WeightingKind::Fastest),
        _ => None,
    }
}

fn header_bytes(ch: &ChStorage) -> [u8; HEADER_SIZE] {
    let mut bytes = [0u8; HEADER_SIZE];
    bytes[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    bytes[4..6].copy_from_slice(&VERSION.to_le_bytes());
    bytes[6] = kind_to_byte(ch.weighting.kind);
    bytes[8..16].copy_from_slice(&(ch.node_count() as u64).to_le_bytes());
    bytes[16..24].copy_from_slice(&(ch.base_edge_count() as u64).to_le_bytes());
    bytes[24..32].copy_from_slice(&(ch.shortcut_count() as u64).to_le_bytes());
    bytes[32..40].copy_from_slice(&ch.weighting.speed_kmh.to_le_bytes());
    bytes
}

fn shortcut_bytes(sc: &Shortcut) -> [u8; SHORTCUT_SIZE] {
    let mut bytes = [0u8; SHORTCUT_SIZE];
    bytes[0..4].copy_from_slice(&sc.from.to_le_bytes());
    bytes[4..8].copy_from_slice(&sc.to.to_le_bytes());
    bytes[8] = sc.flags.bits();
    bytes[12..20].copy_from_slice(&sc.weight.to_le_bytes());
    bytes[20..28].copy_from_slice(&sc.time.to_le_bytes());
    bytes[28..32].copy_from_slice(&sc.skip1.0.to_le_bytes());
    bytes[32..36].copy_from_slice(&sc.skip2.0.to_le_bytes());
    bytes[36..40].copy_from_slice(&sc.orig_count.to_le_bytes());
    bytes
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(word)
}

fn parse_shortcut(bytes: &[u8]) -> Shortcut {
    Shortcut {
        from: u32_at(bytes, 0),
        to: u32_at(bytes, 4),
        flags: EdgeFlags::from_bits(bytes[8]),
        weight: f64::from_bits(u64_at(bytes, 12)),
        time: u64_at(bytes, 20),
        skip1: EdgeId(u32_at(bytes, 28)),
        skip2: EdgeId(u32_at(bytes, 32)),
        orig_count: u32_at(bytes, 36),
    }
}

impl ChStorage {
    /// Write ch.bin
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = ChecksumWriter::new(BufWriter::new(file));
        let io = |e| Error::io(path, e);

        writer.write_all(&header_bytes(self)).map_err(io)?;
        for level in &self.levels {
            writer.write_all(&level.to_le_bytes()).map_err(io)?;
        }
        for sc in &self.shortcuts {
            writer.write_all(&shortcut_bytes(sc)).map_err(io)?;
        }
        writer.finish().map_err(io)?;
        Ok(())
    }

    /// Read and validate ch.bin
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingStorage(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        let body = verify_footer(&bytes).map_err(|r| Error::malformed(path, r))?;
        if body.len() < HEADER_SIZE {
            return Err(Error::malformed(path, "header too short"));
        }
        if u32_at(body, 0) != MAGIC {
            return Err(Error::malformed(
                path,
                format!("invalid magic number: {:08x}", u32_at(body, 0)),
            ));
        }
        let version = u16::from_le_bytes([body[4], body[5]]);
        if version != VERSION {
            return Err(Error::malformed(path, format!("unsupported version: {}", version)));
        }
        let kind = kind_from_byte(body[6])
            .ok_or_else(|| Error::malformed(path, format!("unknown weighting {}", body[6])))?;
        let base_edges = u64_at(body, 16);
        let speed_kmh = f64::from_bits(u64_at(body, 32));

        let (nodes, level_bytes) = body_len(u64_at(body, 8), 4)
            .ok_or_else(|| Error::malformed(path, "node count overflows"))?;
        let (shortcuts, shortcut_bytes) = body_len(u64_at(body, 24), SHORTCUT_SIZE)
            .ok_or_else(|| Error::malformed(path, "shortcut count overflows"))?;
        let levels_end = HEADER_SIZE
            .checked_add(level_bytes)
            .ok_or_else(|| Error::malformed(path, "node count overflows"))?;
        let expected = levels_end
            .checked_add(shortcut_bytes)
            .ok_or_else(|| Error::malformed(path, "shortcut count overflows"))?;
        if body.len() != expected || base_edges > u32::MAX as u64 {
            return Err(Error::malformed(
                path,
                format!(
                    "expected {} bytes for {} nodes and {} shortcuts, found {}",
                    expected,
                    nodes,
                    shortcuts,
                    body.len()
                ),
            ));
        }

        let levels = (HEADER_SIZE..levels_end).step_by(4).map(|at| u32_at(body, at)).collect();
        let shortcuts = body[levels_end..]
            .chunks_exact(SHORTCUT_SIZE)
            .map(parse_shortcut)
            .collect();

        let ch = ChStorage {
            base_edges: base_edges as u32,
            levels,
            shortcuts,
            weighting: WeightingConfig { kind, speed_kmh },
        };
        ch.validate()
            .map_err(|e| Error::malformed(path, e.to_string()))?;
        Ok(ch)
    }
}
