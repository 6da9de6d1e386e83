//! Archive header — the fixed opening record.
//!
//! # On-disk layout (74 bytes, all numeric fields little-endian)
//!
//! ```text
//! Offset  Size  Field
//!    0      4   magic               = "VFA1" (4 ASCII bytes, not LE)
//!    4      2   version             = 1                      (LE u16)
//!    6      4   flags               ENCRYPTED=0x1 SOLID=0x2  (LE u32)
//!   10      1   default_method      compression tag 0..4
//!   11      1   default_level       signed — zstd's legal range dips to -5
//!   12      1   block_exp           chunk size = 1 << block_exp
//!   13      2   threads_hint                                 (LE u16)
//!   15      4   ram_mib_hint                                 (LE u32)
//!   19      1   kdf_id              0 none, 1 argon2id, 2 scrypt
//!   20      4   kdf_t                                        (LE u32)
//!   24      4   kdf_m                                        (LE u32)
//!   28      1   kdf_p
//!   29     16   salt                KDF salt
//!   45      1   aead_id             0 none, 1 aes-256-gcm
//!   46     12   aead_nonce_prefix
//!   58     16   reserved            zero
//! ```
//!
//! Total fixed size: 4+2+4+1+1+1+2+4+1+4+4+1+16+1+12+16 = 74 bytes. The
//! header carries no checksum of its own — the whole-archive hash in the
//! footer covers it (spec §4.C).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"VFA1";
pub const VERSION: u16 = 1;
pub const HEADER_SIZE: usize = 74;

pub const FLAG_ENCRYPTED: u32 = 1 << 0;
pub const FLAG_SOLID:     u32 = 1 << 1;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("not a VFA archive (bad magic)")]
    BadMagic,
    #[error("unsupported header version {0}")]
    UnsupportedVersion(u16),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct Header {
    pub version: u16,
    pub flags: u32,
    pub default_method: u8,
    pub default_level: i8,
    pub block_exp: u8,
    pub threads_hint: u16,
    pub ram_mib_hint: u32,
    pub kdf_id: u8,
    pub kdf_t: u32,
    pub kdf_m: u32,
    pub kdf_p: u8,
    pub salt: [u8; 16],
    pub aead_id: u8,
    pub aead_nonce_prefix: [u8; 12],
    pub reserved: [u8; 16],
}

impl Header {
    pub fn is_encrypted(&self) -> bool { self.flags & FLAG_ENCRYPTED != 0 }
    pub fn is_solid(&self)     -> bool { self.flags & FLAG_SOLID != 0 }
    pub fn block_size(&self)   -> usize { 1usize << self.block_exp }

    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_u16::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.flags)?;
        w.write_u8(self.default_method)?;
        w.write_i8(self.default_level)?;
        w.write_u8(self.block_exp)?;
        w.write_u16::<LittleEndian>(self.threads_hint)?;
        w.write_u32::<LittleEndian>(self.ram_mib_hint)?;
        w.write_u8(self.kdf_id)?;
        w.write_u32::<LittleEndian>(self.kdf_t)?;
        w.write_u32::<LittleEndian>(self.kdf_m)?;
        w.write_u8(self.kdf_p)?;
        w.write_all(&self.salt)?;
        w.write_u8(self.aead_id)?;
        w.write_all(&self.aead_nonce_prefix)?;
        w.write_all(&self.reserved)?;
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(HeaderError::BadMagic);
        }
        let version = r.read_u16::<LittleEndian>()?;
        if version != VERSION {
            return Err(HeaderError::UnsupportedVersion(version));
        }
        let flags = r.read_u32::<LittleEndian>()?;
        let default_method = r.read_u8()?;
        let default_level = r.read_i8()?;
        let block_exp = r.read_u8()?;
        let threads_hint = r.read_u16::<LittleEndian>()?;
        let ram_mib_hint = r.read_u32::<LittleEndian>()?;
        let kdf_id = r.read_u8()?;
        let kdf_t = r.read_u32::<LittleEndian>()?;
        let kdf_m = r.read_u32::<LittleEndian>()?;
        let kdf_p = r.read_u8()?;
        let mut salt = [0u8; 16];
        r.read_exact(&mut salt)?;
        let aead_id = r.read_u8()?;
        let mut aead_nonce_prefix = [0u8; 12];
        r.read_exact(&mut aead_nonce_prefix)?;
        let mut reserved = [0u8; 16];
        r.read_exact(&mut reserved)?;

        Ok(Self {
            version, flags, default_method, default_level, block_exp,
            threads_hint, ram_mib_hint, kdf_id, kdf_t, kdf_m, kdf_p,
            salt, aead_id, aead_nonce_prefix, reserved,
        })
    }
}
