//! Verifier — archive-wide integrity test (spec §4.I).
//!
//! Recomputes the footer's whole-archive digest, then walks every block
//! (block mode) or the whole solid stream (solid mode) to confirm each
//! one decrypts, decompresses, and matches its declared size.

use crate::codec::{self, HashKind, Hasher, Method};
use crate::crypto::AAD_DATA;
use crate::error::VfaError;
use crate::footer::FOOTER_SIZE;
use crate::reader::{self, OpenArchive};
use crate::toc::Kind;
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub struct VerifyReport {
    pub files: usize,
    pub blocks: usize,
    pub digest_ok: bool,
}

pub fn test(archive_path: &Path, password: &Option<String>) -> Result<VerifyReport, VfaError> {
    let OpenArchive { header, footer, toc, key } = reader::open(archive_path, password)?;

    let mut file = File::open(archive_path)?;
    let total_len = file.seek(SeekFrom::End(0))?;
    let digest_end = total_len.saturating_sub(FOOTER_SIZE as u64);
    let hash_kind = HashKind::from_tag(footer.hash_kind).unwrap_or(HashKind::None);
    let digest = recompute_digest(&mut file, digest_end, hash_kind)?;
    let digest_ok = digest == footer.digest;
    if !digest_ok {
        return Err(VfaError::Integrity("footer digest mismatch".to_string()));
    }

    file.seek(SeekFrom::Start(crate::header::HEADER_SIZE as u64))?;

    if header.is_solid() {
        let expected: u64 = toc.entries.iter().filter(|e| e.kind == Kind::File).map(|e| e.size).sum();
        let mut total = 0u64;
        loop {
            let pos = file.stream_position()?;
            if pos >= footer.toc_offset {
                break;
            }
            let (method, payload) = read_frame(&mut file)?;
            let plain = match &key {
                Some(k) => crate::crypto::decrypt(k, &header.aead_nonce_prefix, 0, AAD_DATA, &payload)?,
                None => payload,
            };
            let data = codec::decompress(Method::from_tag(method)?, &plain)?;
            total += data.len() as u64;
        }
        if total != expected {
            return Err(VfaError::Integrity(format!("solid stream size mismatch: expected {expected}, got {total}")));
        }
        let files = toc.entries.iter().filter(|e| e.kind == Kind::File).count();
        Ok(VerifyReport { files, blocks: 0, digest_ok })
    } else {
        let mut blocks = 0usize;
        let mut files = 0usize;
        for e in toc.entries.iter().filter(|e| e.kind == Kind::File) {
            files += 1;
            for b in &e.blocks {
                let (method, payload) = read_frame(&mut file)?;
                if payload.len() as u32 != b.csz {
                    return Err(VfaError::Integrity(format!("block {} frame length mismatch for {}", b.index, e.path)));
                }
                let plain = match &key {
                    Some(k) => crate::crypto::decrypt(k, &header.aead_nonce_prefix, b.index, AAD_DATA, &payload)?,
                    None => payload,
                };
                let data = codec::decompress(Method::from_tag(method)?, &plain)?;
                if data.len() as u32 != b.usz {
                    return Err(VfaError::Integrity(format!("block {} decompressed size mismatch for {}", b.index, e.path)));
                }
                blocks += 1;
            }
        }
        Ok(VerifyReport { files, blocks, digest_ok })
    }
}

fn read_frame<R: Read>(r: &mut R) -> Result<(u8, Vec<u8>), VfaError> {
    let len = r.read_u32::<LittleEndian>()?;
    let method = r.read_u8()?;
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    Ok((method, payload))
}

fn recompute_digest(file: &mut File, upto: u64, kind: HashKind) -> Result<[u8; 32], VfaError> {
    file.seek(SeekFrom::Start(0))?;
    let mut hasher = Hasher::new(kind);
    let mut remaining = upto;
    let mut buf = [0u8; 1 << 20];
    while remaining > 0 {
        let take = (buf.len() as u64).min(remaining) as usize;
        file.read_exact(&mut buf[..take])?;
        hasher.update(&buf[..take]);
        remaining -= take as u64;
    }
    Ok(hasher.finish())
}
