//! Reader — the extraction engine (spec §4.H).
//!
//! Parses header → footer → TOC, then materializes entries in a fixed
//! order — directories, the solid stream (if any), symlinks, files,
//! hard links — so every hard link's target already exists by the time
//! it is created.

use crate::codec::{self, Method};
use crate::crypto::{self, KdfParams, AAD_DATA, AAD_TOC, TOC_NONCE_INDEX};
use crate::error::{PolicyError, VfaError};
use crate::footer::Footer;
use crate::header::Header;
use crate::log::VfaLog;
use crate::meta::{self, CaptureOptions, MetaJson};
use crate::toc::{Kind, Toc};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct ExtractOptions {
    pub password: Option<String>,
    pub capture: CaptureOptions,
}

pub struct ExtractReport {
    pub entries: usize,
}

/// Everything needed to walk an archive's block stream and TOC, shared by
/// `extract`, `list`, and the verifier.
pub struct OpenArchive {
    pub header: Header,
    pub footer: Footer,
    pub toc: Toc,
    pub key: Option<[u8; 32]>,
}

pub fn open(path: &Path, password: &Option<String>) -> Result<OpenArchive, VfaError> {
    let mut file = File::open(path)?;
    let header = Header::read(&mut file)?;
    let footer = Footer::read_from_end(&mut file)?;
    file.seek(SeekFrom::Start(footer.toc_offset))?;
    let mut toc_bytes = vec![0u8; footer.toc_size as usize];
    file.read_exact(&mut toc_bytes)?;

    let key = if header.is_encrypted() {
        let password = password.as_ref().ok_or(PolicyError::MissingPassword)?;
        let params = KdfParams { kdf_id: header.kdf_id, t: header.kdf_t, m: header.kdf_m, p: header.kdf_p };
        Some(crypto::derive_key(password, &header.salt, params)?)
    } else {
        None
    };

    let toc_plain = match &key {
        Some(k) => crypto::decrypt(k, &header.aead_nonce_prefix, TOC_NONCE_INDEX, AAD_TOC, &toc_bytes)
            .map_err(|_| VfaError::Policy(PolicyError::WrongPassword))?,
        None => toc_bytes,
    };
    let toc = Toc::parse(&toc_plain, header.is_solid())?;

    Ok(OpenArchive { header, footer, toc, key })
}

/// Read every block frame from the current cursor position up to `stop`,
/// decrypting each under `nonce_index` (spec §9: every solid block is
/// sealed under index 0, never its emission index) and decompressing with
/// the archive's default method. Used for solid-mode decode in both
/// extract and verify.
fn decode_solid_stream<R: Read + Seek>(r: &mut R, stop: u64, header: &Header, key: Option<&[u8; 32]>) -> Result<Vec<u8>, VfaError> {
    let mut out = Vec::new();
    loop {
        let pos = r.stream_position()?;
        if pos >= stop {
            break;
        }
        let (method, payload) = read_frame(r)?;
        let plain = match key {
            Some(k) => crypto::decrypt(k, &header.aead_nonce_prefix, 0, AAD_DATA, &payload)?,
            None => payload,
        };
        let data = codec::decompress(Method::from_tag(method)?, &plain)?;
        out.extend_from_slice(&data);
    }
    Ok(out)
}

fn read_frame<R: Read>(r: &mut R) -> Result<(u8, Vec<u8>), VfaError> {
    let len = r.read_u32::<LittleEndian>()?;
    let method = r.read_u8()?;
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    Ok((method, payload))
}

pub fn extract(archive_path: &Path, out_dir: &Path, opts: &ExtractOptions, log: &VfaLog) -> Result<ExtractReport, VfaError> {
    fs::create_dir_all(out_dir)?;
    let OpenArchive { header, footer, toc, key } = open(archive_path, &opts.password)?;
    let mut file = File::open(archive_path)?;
    file.seek(SeekFrom::Start(crate::header::HEADER_SIZE as u64))?;

    let dirs: Vec<_> = toc.entries.iter().filter(|e| e.kind == Kind::Dir).collect();
    let syms: Vec<_> = toc.entries.iter().filter(|e| e.kind == Kind::Symlink).collect();
    let hlinks: Vec<_> = toc.entries.iter().filter(|e| e.kind == Kind::HardLink).collect();
    let files: Vec<_> = toc.entries.iter().filter(|e| e.kind == Kind::File).collect();

    for e in &dirs {
        let out_path = out_dir.join(&e.path);
        fs::create_dir_all(&out_path)?;
        apply_mode(&out_path, e.mode, log);
        apply_mtime(&out_path, e.mtime, false, log);
        let meta = MetaJson::from_bytes(e.meta.as_deref().unwrap_or(&[]));
        if let Some(win) = &meta.win {
            meta::win::apply(&out_path, win, true);
        }
        apply_posix(&out_path, &meta, true, &opts.capture, log);
        crate::vlog_trace!(log, "Created directory {}", e.path);
    }

    let solid_concat = if header.is_solid() {
        Some(decode_solid_stream(&mut file, footer.toc_offset, &header, key.as_ref())?)
    } else {
        None
    };

    for e in &syms {
        let out_path = out_dir.join(&e.path);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let meta = MetaJson::from_bytes(e.meta.as_deref().unwrap_or(&[]));
        let target = meta.link_target.clone().unwrap_or_default();
        let _ = fs::remove_file(&out_path);
        #[cfg(unix)]
        {
            if let Err(err) = std::os::unix::fs::symlink(&target, &out_path) {
                crate::vlog_debug!(log, "symlink {} -> {target} failed: {err}", e.path);
            }
        }
        #[cfg(not(unix))]
        {
            crate::vlog_debug!(log, "symlinks unsupported on this platform: {}", e.path);
        }
        apply_posix(&out_path, &meta, false, &opts.capture, log);
        crate::vlog_trace!(log, "Created symlink {} -> {target}", e.path);
    }

    for e in &files {
        let out_path = out_dir.join(&e.path);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if header.is_solid() {
            let buf = solid_concat.as_ref().expect("solid stream decoded");
            let start = e.start_off as usize;
            let end = start + e.size as usize;
            let mut fw = File::create(&out_path)?;
            fw.write_all(&buf[start..end])?;
        } else {
            let mut fw = File::create(&out_path)?;
            for b in &e.blocks {
                let (_method, payload) = read_frame(&mut file)?;
                if payload.len() as u32 != b.csz {
                    return Err(VfaError::Integrity(format!("block {} length mismatch for {}", b.index, e.path)));
                }
                let plain = match &key {
                    Some(k) => crypto::decrypt(k, &header.aead_nonce_prefix, b.index, AAD_DATA, &payload)?,
                    None => payload,
                };
                let data = codec::decompress(Method::from_tag(b.method)?, &plain)?;
                if data.len() as u32 != b.usz {
                    return Err(VfaError::Integrity(format!("block {} size mismatch for {}", b.index, e.path)));
                }
                fw.write_all(&data)?;
            }
        }
        apply_mode(&out_path, e.mode, log);
        apply_mtime(&out_path, e.mtime, false, log);
        let meta = MetaJson::from_bytes(e.meta.as_deref().unwrap_or(&[]));
        if let Some(win) = &meta.win {
            meta::win::apply(&out_path, win, false);
        }
        apply_posix(&out_path, &meta, true, &opts.capture, log);
        if opts.capture.sparse {
            punch_holes(&out_path, &meta, log);
        }
        crate::vlog_debug!(log, "Extracted {}", e.path);
    }

    for e in &hlinks {
        let out_path = out_dir.join(&e.path);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let meta = MetaJson::from_bytes(e.meta.as_deref().unwrap_or(&[]));
        let Some(target) = meta.hardlink_to.clone() else { continue };
        let src = out_dir.join(&target);
        if src.exists() {
            let _ = fs::remove_file(&out_path);
            if let Err(err) = fs::hard_link(&src, &out_path) {
                crate::vlog_debug!(log, "hardlink {} -> {target} failed (best-effort): {err}", e.path);
            } else {
                crate::vlog_trace!(log, "Created hardlink {} -> {target}", e.path);
            }
        } else {
            crate::vlog_debug!(log, "hardlink target {target} missing, skipping {}", e.path);
        }
    }

    Ok(ExtractReport { entries: toc.entries.len() })
}

fn apply_mode(path: &Path, mode: u32, log: &VfaLog) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(mode)) {
            crate::vlog_debug!(log, "chmod {} failed: {e}", path.display());
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode, log);
    }
}

fn apply_mtime(path: &Path, mtime_secs: u64, is_symlink: bool, log: &VfaLog) {
    let ft = filetime::FileTime::from_unix_time(mtime_secs as i64, 0);
    let result = if is_symlink {
        filetime::set_symlink_file_times(path, ft, ft)
    } else {
        filetime::set_file_mtime(path, ft)
    };
    if let Err(e) = result {
        crate::vlog_debug!(log, "setting mtime on {} failed: {e}", path.display());
    }
}

fn apply_posix(path: &Path, meta: &MetaJson, follow: bool, opts: &CaptureOptions, log: &VfaLog) {
    meta::posix::apply(path, meta, follow, opts, log);
}

fn punch_holes(path: &Path, meta: &MetaJson, log: &VfaLog) {
    let Some(holes) = &meta.holes else { return };
    if holes.is_empty() {
        return;
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(f) = fs::OpenOptions::new().write(true).open(path) {
            for (offset, length) in holes {
                meta::posix::punch_hole(&f, *offset, *length, log);
            }
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = (path, log);
    }
}

pub fn list(archive_path: &Path, password: &Option<String>) -> Result<(Header, Toc), VfaError> {
    let opened = open(archive_path, password)?;
    Ok((opened.header, opened.toc))
}

pub fn resolve_out_dir(out_dir: &Option<PathBuf>) -> PathBuf {
    out_dir.clone().unwrap_or_else(|| PathBuf::from("."))
}
