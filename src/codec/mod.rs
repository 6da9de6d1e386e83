//! Block compression codecs.
//!
//! # Identity
//! Unlike a format that carries a 16-byte codec UUID per block, VFA tags
//! every block frame with a single byte (spec §3): `0` none, `1` zlib,
//! `2` lzma/xz, `3` brotli, `4` zstd. There is no negotiation and no
//! plugin registry — the five methods are fixed at compile time.
//!
//! # Levels
//! Each codec clamps its level into the range it actually supports before
//! compressing; a level outside that range is silently clamped rather than
//! rejected.

use std::io::{Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("compression error: {0}")]
    Compression(String),
    #[error("decompression error: {0}")]
    Decompression(String),
    #[error("unknown compression method tag {0}")]
    UnknownMethod(u8),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire tag for each compression method. Frozen — never renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    None   = 0,
    Zlib   = 1,
    Lzma   = 2,
    Brotli = 3,
    Zstd   = 4,
}

impl Method {
    pub fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(Method::None),
            1 => Ok(Method::Zlib),
            2 => Ok(Method::Lzma),
            3 => Ok(Method::Brotli),
            4 => Ok(Method::Zstd),
            other => Err(CodecError::UnknownMethod(other)),
        }
    }

    pub fn tag(self) -> u8 { self as u8 }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "store" => Some(Method::None),
            "zlib"           => Some(Method::Zlib),
            "lzma" | "xz"    => Some(Method::Lzma),
            "brotli"         => Some(Method::Brotli),
            "zstd"           => Some(Method::Zstd),
            _                => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::None   => "none",
            Method::Zlib   => "zlib",
            Method::Lzma   => "lzma",
            Method::Brotli => "brotli",
            Method::Zstd   => "zstd",
        }
    }

    /// Clamp a requested level into this codec's supported range.
    pub fn clamp_level(self, level: i32) -> i32 {
        match self {
            Method::None   => 0,
            Method::Zlib   => level.clamp(1, 9),
            Method::Lzma   => level.clamp(0, 9),
            Method::Brotli => level.clamp(0, 11),
            Method::Zstd   => level.clamp(-5, 22),
        }
    }
}

pub trait Codec {
    fn method(&self) -> Method;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn method(&self) -> Method { Method::None }
    fn compress(&self, data: &[u8], _level: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct ZlibCodec;
impl Codec for ZlibCodec {
    fn method(&self) -> Method { Method::Zlib }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        use flate2::{write::ZlibEncoder, Compression};
        let level = Method::Zlib.clamp_level(level) as u32;
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(level));
        enc.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        enc.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        use flate2::read::ZlibDecoder;
        let mut out = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

pub struct LzmaCodec;
impl Codec for LzmaCodec {
    fn method(&self) -> Method { Method::Lzma }
    fn compress(&self, data: &[u8], _level: i32) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        lzma_rs::lzma_compress(&mut std::io::Cursor::new(data), &mut out)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        lzma_rs::lzma_decompress(&mut std::io::Cursor::new(data), &mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

pub struct BrotliCodec;
impl Codec for BrotliCodec {
    fn method(&self) -> Method { Method::Brotli }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        let quality = Method::Brotli.clamp_level(level) as u32;
        let mut out = Vec::new();
        {
            let mut w = brotli::CompressorWriter::new(&mut out, 4096, quality, 22);
            w.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        }
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        brotli::Decompressor::new(data, 4096).read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn method(&self) -> Method { Method::Zstd }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        let level = Method::Zstd.clamp_level(level);
        zstd::encode_all(data, level).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

/// Resolve a wire tag to a codec instance. Fails hard — no fallback.
pub fn get_codec(method: Method) -> Box<dyn Codec> {
    match method {
        Method::None   => Box::new(NoneCodec),
        Method::Zlib   => Box::new(ZlibCodec),
        Method::Lzma   => Box::new(LzmaCodec),
        Method::Brotli => Box::new(BrotliCodec),
        Method::Zstd   => Box::new(ZstdCodec),
    }
}

pub fn compress(method: Method, level: i32, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    get_codec(method).compress(data, level)
}

pub fn decompress(method: Method, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    get_codec(method).decompress(data)
}

// ── Hash facade (spec §3/§4.A) ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    None   = 0,
    Sha256 = 1,
    Blake3 = 2,
    Xxh64  = 3,
}

impl HashKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(HashKind::None),
            1 => Some(HashKind::Sha256),
            2 => Some(HashKind::Blake3),
            3 => Some(HashKind::Xxh64),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 { self as u8 }

    /// Preference order when none is explicitly requested: xxh64 > blake3 > sha256.
    pub fn default_kind() -> Self { HashKind::Xxh64 }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none"          => Some(HashKind::None),
            "sha256"        => Some(HashKind::Sha256),
            "blake3"        => Some(HashKind::Blake3),
            "xxh64"         => Some(HashKind::Xxh64),
            _               => None,
        }
    }

    /// Digest the bytes, returning a 32-byte slot. Shorter digests are
    /// zero-padded on the right — xxh64 occupies the first 8 bytes.
    pub fn digest(self, data: &[u8]) -> [u8; 32] {
        let mut h = Hasher::new(self);
        h.update(data);
        h.finish()
    }
}

/// Incremental form of the hash facade — the footer digest covers the
/// whole archive byte range (minus the footer itself), so the writer and
/// the verifier feed it the stream piecemeal rather than buffering it.
pub enum Hasher {
    None,
    Sha256(Box<sha2::Sha256>),
    Blake3(Box<blake3::Hasher>),
    Xxh64(Box<xxhash_rust::xxh64::Xxh64>),
}

impl Hasher {
    pub fn new(kind: HashKind) -> Self {
        use sha2::Digest;
        match kind {
            HashKind::None => Hasher::None,
            HashKind::Sha256 => Hasher::Sha256(Box::new(sha2::Sha256::new())),
            HashKind::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
            HashKind::Xxh64 => Hasher::Xxh64(Box::new(xxhash_rust::xxh64::Xxh64::new(0))),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        match self {
            Hasher::None => {}
            Hasher::Sha256(h) => h.update(data),
            Hasher::Blake3(h) => { h.update(data); }
            Hasher::Xxh64(h) => h.update(data),
        }
    }

    pub fn finish(self) -> [u8; 32] {
        use sha2::Digest;
        let mut out = [0u8; 32];
        match self {
            Hasher::None => {}
            Hasher::Sha256(h) => out.copy_from_slice(&h.finalize()),
            Hasher::Blake3(h) => out = *h.finalize().as_bytes(),
            Hasher::Xxh64(h) => out[..8].copy_from_slice(&h.digest().to_le_bytes()),
        }
        out
    }
}
