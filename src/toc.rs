//! Table of contents — the ordered entry list between the block stream and
//! the footer (spec §3/§4.D).
//!
//! Two on-disk variants share a common entry prefix and diverge only in
//! their per-entry tail: block-mode entries carry a list of block
//! descriptors, solid-mode entries carry a single stream offset. The
//! variant in use is selected by the header's `SOLID` flag, never stored
//! per-entry.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TocError {
    #[error("TOC entry path is not valid UTF-8")]
    BadPath,
    #[error("unknown entry kind tag {0}")]
    UnknownKind(u8),
    #[error("unexpected end of TOC data")]
    Truncated,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<std::string::FromUtf8Error> for TocError {
    fn from(_: std::string::FromUtf8Error) -> Self { TocError::BadPath }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    File = 0,
    Dir = 1,
    Symlink = 2,
    HardLink = 3,
}

impl Kind {
    pub fn from_tag(tag: u8) -> Result<Self, TocError> {
        match tag {
            0 => Ok(Kind::File),
            1 => Ok(Kind::Dir),
            2 => Ok(Kind::Symlink),
            3 => Ok(Kind::HardLink),
            other => Err(TocError::UnknownKind(other)),
        }
    }
    pub fn tag(self) -> u8 { self as u8 }
}

/// `(block_index, uncompressed_size, compressed_size, method)` — spec §3.
#[derive(Debug, Clone, Copy)]
pub struct BlockDesc {
    pub index: u64,
    pub usz: u32,
    pub csz: u32,
    pub method: u8,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub mode: u32,
    pub mtime: u64,
    pub size: u64,
    pub kind: Kind,
    pub meta: Option<Vec<u8>>,
    /// Block-mode: ordered block descriptors for this entry's bytes.
    pub blocks: Vec<BlockDesc>,
    /// Solid-mode: offset into the reconstructed solid stream.
    pub start_off: u64,
}

impl Entry {
    pub fn new(path: String, mode: u32, mtime: u64, size: u64, kind: Kind, meta: Option<Vec<u8>>) -> Self {
        Self { path, mode, mtime, size, kind, meta, blocks: Vec::new(), start_off: 0 }
    }

    fn write_common<W: Write>(&self, mut w: W, solid: bool) -> io::Result<()> {
        let path_bytes = self.path.as_bytes();
        w.write_u16::<LittleEndian>(path_bytes.len() as u16)?;
        w.write_all(path_bytes)?;
        w.write_u32::<LittleEndian>(self.mode)?;
        w.write_u64::<LittleEndian>(self.mtime)?;
        w.write_u64::<LittleEndian>(self.size)?;
        w.write_u32::<LittleEndian>(self.blocks.len() as u32)?;
        w.write_u8(self.kind.tag())?;
        let meta = self.meta.as_deref().unwrap_or(&[]);
        w.write_u32::<LittleEndian>(meta.len() as u32)?;
        if !meta.is_empty() {
            w.write_all(meta)?;
        }
        if solid {
            w.write_u64::<LittleEndian>(self.start_off)?;
        } else {
            for b in &self.blocks {
                w.write_u64::<LittleEndian>(b.index)?;
                w.write_u32::<LittleEndian>(b.usz)?;
                w.write_u32::<LittleEndian>(b.csz)?;
                w.write_u8(b.method)?;
            }
        }
        Ok(())
    }

    /// Parse one entry. The kind/metadata-length pair was added after v1
    /// shipped, so a parser that cannot read them must roll back and treat
    /// the entry as a metadata-less file — spec §4.D's compatibility rule.
    fn read_one(cur: &mut Cursor<&[u8]>, solid: bool) -> Result<Self, TocError> {
        let plen = cur.read_u16::<LittleEndian>()?;
        let mut path_bytes = vec![0u8; plen as usize];
        cur.read_exact(&mut path_bytes)?;
        let path = String::from_utf8(path_bytes)?;
        let mode = cur.read_u32::<LittleEndian>()?;
        let mtime = cur.read_u64::<LittleEndian>()?;
        let size = cur.read_u64::<LittleEndian>()?;
        let nb = cur.read_u32::<LittleEndian>()?;

        let before_kind = cur.position();
        let (kind, meta) = match Self::read_kind_and_meta(cur) {
            Ok(v) => v,
            Err(_) => {
                cur.set_position(before_kind);
                (Kind::File, None)
            }
        };

        let mut blocks = Vec::with_capacity(nb as usize);
        let mut start_off = 0u64;
        if solid {
            start_off = cur.read_u64::<LittleEndian>()?;
        } else {
            for _ in 0..nb {
                let index = cur.read_u64::<LittleEndian>()?;
                let usz = cur.read_u32::<LittleEndian>()?;
                let csz = cur.read_u32::<LittleEndian>()?;
                let method = cur.read_u8()?;
                blocks.push(BlockDesc { index, usz, csz, method });
            }
        }

        Ok(Self { path, mode, mtime, size, kind, meta, blocks, start_off })
    }

    fn read_kind_and_meta(r: &mut Cursor<&[u8]>) -> Result<(Kind, Option<Vec<u8>>), TocError> {
        let tag = r.read_u8()?;
        let kind = Kind::from_tag(tag)?;
        let mlen = r.read_u32::<LittleEndian>()?;
        let meta = if mlen > 0 {
            let mut buf = vec![0u8; mlen as usize];
            r.read_exact(&mut buf)?;
            Some(buf)
        } else {
            None
        };
        Ok((kind, meta))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Toc {
    pub entries: Vec<Entry>,
}

impl Toc {
    pub fn pack(&self, solid: bool) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        for e in &self.entries {
            e.write_common(&mut out, solid)?;
        }
        Ok(out)
    }

    pub fn parse(data: &[u8], solid: bool) -> Result<Self, TocError> {
        let mut cur = Cursor::new(data);
        let n = cur.read_u32::<LittleEndian>()?;
        let mut entries = Vec::with_capacity(n as usize);
        for _ in 0..n {
            entries.push(Entry::read_one(&mut cur, solid)?);
        }
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_mode_round_trip() {
        let mut toc = Toc::default();
        let mut e = Entry::new("a.txt".into(), 0o644, 12345, 5, Kind::File, None);
        e.blocks.push(BlockDesc { index: 0, usz: 5, csz: 8, method: 4 });
        toc.entries.push(e);
        let packed = toc.pack(false).unwrap();
        let parsed = Toc::parse(&packed, false).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].path, "a.txt");
        assert_eq!(parsed.entries[0].blocks[0].csz, 8);
    }

    #[test]
    fn solid_mode_round_trip() {
        let mut toc = Toc::default();
        let mut e = Entry::new("b.bin".into(), 0o600, 99, 1024, Kind::File, None);
        e.start_off = 4096;
        toc.entries.push(e);
        let packed = toc.pack(true).unwrap();
        let parsed = Toc::parse(&packed, true).unwrap();
        assert_eq!(parsed.entries[0].start_off, 4096);
    }

    #[test]
    fn metadata_round_trips_verbatim() {
        let mut toc = Toc::default();
        let meta = br#"{"posix":{"uid":1000}}"#.to_vec();
        toc.entries.push(Entry::new("d".into(), 0o755, 0, 0, Kind::Dir, Some(meta.clone())));
        let packed = toc.pack(false).unwrap();
        let parsed = Toc::parse(&packed, false).unwrap();
        assert_eq!(parsed.entries[0].meta.as_deref(), Some(meta.as_slice()));
    }
}
