//! Flat binary files backing a graph store directory
//!
//! Every file is `header | body | crc64`. The header carries a per-kind magic,
//! a format version and the element count so truncated or swapped files are
//! rejected before the body is interpreted.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::checksum::{verify_footer, ChecksumWriter};
use crate::error::{Error, Result};

pub const MAGIC_FLOATS: u32 = 0x4243_4646; // "BCFF"
pub const MAGIC_INTS: u32 = 0x4243_4649; // "BCFI"
pub const MAGIC_SETTINGS: u32 = 0x4243_5354; // "BCST"
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 16;
const FOOTER_SIZE: usize = 8;

struct Header {
    magic: u32,
    version: u16,
    reserved: u16,
    count: u64,
}

impl Header {
    fn new(magic: u32, count: usize) -> Self {
        Self {
            magic,
            version: VERSION,
            reserved: 0,
            count: count as u64,
        }
    }

    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.reserved.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.count.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8], expected_magic: u32) -> std::result::Result<Self, String> {
        if bytes.len() < HEADER_SIZE {
            return Err("header too short".to_string());
        }
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != expected_magic {
            return Err(format!("invalid magic number: {:08x}", magic));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(format!("unsupported version: {}", version));
        }
        let reserved = u16::from_le_bytes([bytes[6], bytes[7]]);
        if reserved != 0 {
            return Err(format!("reserved header field is {:04x}, expected 0", reserved));
        }
        let mut count = [0u8; 8];
        count.copy_from_slice(&bytes[8..16]);
        Ok(Self {
            magic,
            version,
            reserved,
            count: u64::from_le_bytes(count),
        })
    }
}

/// Store-wide values that are not per node or per record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub node_count: i32,
    pub creation_time_ms: i64,
}

fn write_file(path: &Path, magic: u32, count: usize, body: &[u8]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = ChecksumWriter::new(BufWriter::new(file));
    writer
        .write_all(&Header::new(magic, count).to_bytes())
        .map_err(|e| Error::io(path, e))?;
    writer.write_all(body).map_err(|e| Error::io(path, e))?;
    writer.finish().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Read a file, verify header and footer, return (count, body)
fn read_file(path: &Path, magic: u32, element_size: usize) -> Result<(usize, Vec<u8>)> {
    if !path.exists() {
        return Err(Error::malformed(path, "file is missing"));
    }
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
        return Err(Error::malformed(path, "file too short"));
    }
    let header = Header::from_bytes(&bytes, magic).map_err(|r| Error::malformed(path, r))?;
    let (count, expected) = body_len(header.count, element_size)
        .and_then(|(count, len)| Some((count, len.checked_add(HEADER_SIZE + FOOTER_SIZE)?)))
        .ok_or_else(|| {
            Error::malformed(path, format!("element count {} overflows", header.count))
        })?;
    if bytes.len() != expected {
        return Err(Error::malformed(
            path,
            format!("expected {} bytes for {} elements, found {}", expected, count, bytes.len()),
        ));
    }
    let body = verify_footer(&bytes).map_err(|r| Error::malformed(path, r))?;
    Ok((count, body[HEADER_SIZE..].to_vec()))
}

/// `count` elements of `element_size` bytes, as `(count, bytes)`; `None` on overflow
pub(crate) fn body_len(count: u64, element_size: usize) -> Option<(usize, usize)> {
    let count = usize::try_from(count).ok()?;
    Some((count, count.checked_mul(element_size)?))
}

pub fn write_floats(path: &Path, values: &[f32]) -> Result<()> {
    let mut body = Vec::with_capacity(values.len() * 4);
    for v in values {
        body.extend_from_slice(&v.to_le_bytes());
    }
    write_file(path, MAGIC_FLOATS, values.len(), &body)
}

pub fn read_floats(path: &Path) -> Result<Vec<f32>> {
    let (count, body) = read_file(path, MAGIC_FLOATS, 4)?;
    let mut values = Vec::with_capacity(count);
    for chunk in body.chunks_exact(4) {
        values.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(values)
}

pub fn write_ints(path: &Path, values: &[i32]) -> Result<()> {
    let mut body = Vec::with_capacity(values.len() * 4);
    for v in values {
        body.extend_from_slice(&v.to_le_bytes());
    }
    write_file(path, MAGIC_INTS, values.len(), &body)
}

pub fn read_ints(path: &Path) -> Result<Vec<i32>> {
    let (count, body) = read_file(path, MAGIC_INTS, 4)?;
    let mut values = Vec::with_capacity(count);
    for chunk in body.chunks_exact(4) {
        values.push(i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(values)
}

pub fn write_settings(path: &Path, settings: Settings) -> Result<()> {
    let mut body = Vec::with_capacity(12);
    body.extend_from_slice(&settings.node_count.to_le_bytes());
    body.extend_from_slice(&settings.creation_time_ms.to_le_bytes());
    write_file(path, MAGIC_SETTINGS, 1, &body)
}

pub fn read_settings(path: &Path) -> Result<Settings> {
    let (_, body) = read_file(path, MAGIC_SETTINGS, 12)?;
    if body.len() != 12 {
        return Err(Error::malformed(path, "settings block must hold exactly one entry"));
    }
    let node_count = i32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&body[4..12]);
    Ok(Settings {
        node_count,
        creation_time_ms: i64::from_le_bytes(ts),
    })
}
