//! CRC-64-ISO checksums for persisted files

use std::io::{self, Write};

use crc::{Crc, CRC_64_GO_ISO};

static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Compute CRC-64 checksum for a byte slice
pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Writer that digests everything it writes and appends the checksum as footer
pub struct ChecksumWriter<W: Write> {
    inner: W,
    digest: crc::Digest<'static, u64>,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.digest.update(bytes);
        self.inner.write_all(bytes)
    }

    /// Write the 8-byte little-endian footer and flush
    pub fn finish(self) -> io::Result<W> {
        let ChecksumWriter { mut inner, digest } = self;
        inner.write_all(&digest.finalize().to_le_bytes())?;
        inner.flush()?;
        Ok(inner)
    }
}

/// Split `bytes` into body and footer and verify the footer
pub fn verify_footer(bytes: &[u8]) -> Result<&[u8], String> {
    if bytes.len() < 8 {
        return Err("file too short for checksum footer".to_string());
    }
    let (body, footer) = bytes.split_at(bytes.len() - 8);
    let stored = u64::from_le_bytes(footer.try_into().map_err(|_| "bad footer".to_string())?);
    let computed = checksum(body);
    if stored != computed {
        return Err(format!(
            "CRC mismatch: expected {:016x}, got {:016x}",
            stored, computed
        ));
    }
    Ok(body)
}
