//! Archive footer — the fixed trailing record (spec §3/§4.E).
//!
//! # On-disk layout (exactly 50 bytes, little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      8   toc_offset    byte offset of the TOC                (LE u64)
//!    1      4   toc_size      TOC size on disk (bytes)               (LE u32)
//!   12      1   hash_kind     0 none, 1 sha256, 2 blake3, 3 xxh64
//!   13     32   digest        whole-archive digest, zero-padded
//!   45      5   end_magic     "/VFA1"
//! ```
//!
//! A reader locates the footer by seeking exactly 50 bytes back from EOF —
//! there is no scanning and no alternate discovery mechanism.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};
use thiserror::Error;

pub const FOOTER_SIZE: usize = 50;
pub const END_MAGIC: &[u8; 5] = b"/VFA1";

#[derive(Error, Debug)]
pub enum FooterError {
    #[error("archive too small to contain a footer")]
    TooSmall,
    #[error("footer end magic mismatch — not a VFA archive or truncated")]
    EndMagicMismatch,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct Footer {
    pub toc_offset: u64,
    pub toc_size: u32,
    pub hash_kind: u8,
    pub digest: [u8; 32],
}

impl Footer {
    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.toc_offset)?;
        w.write_u32::<LittleEndian>(self.toc_size)?;
        w.write_u8(self.hash_kind)?;
        w.write_all(&self.digest)?;
        w.write_all(END_MAGIC)?;
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Self, FooterError> {
        let toc_offset = r.read_u64::<LittleEndian>()?;
        let toc_size = r.read_u32::<LittleEndian>()?;
        let hash_kind = r.read_u8()?;
        let mut digest = [0u8; 32];
        r.read_exact(&mut digest)?;
        let mut end_magic = [0u8; 5];
        r.read_exact(&mut end_magic)?;
        if &end_magic != END_MAGIC {
            return Err(FooterError::EndMagicMismatch);
        }
        Ok(Self { toc_offset, toc_size, hash_kind, digest })
    }

    /// Seek to `len - FOOTER_SIZE` and read the footer there.
    pub fn read_from_end<R: Read + Seek>(mut r: R) -> Result<Self, FooterError> {
        let len = r.seek(SeekFrom::End(0))?;
        if len < FOOTER_SIZE as u64 {
            return Err(FooterError::TooSmall);
        }
        r.seek(SeekFrom::Start(len - FOOTER_SIZE as u64))?;
        Self::read(&mut r)
    }
}
