//! POSIX metadata capture/apply — uid/gid/mode/times, xattrs, ACLs,
//! SELinux context, sparse holes (spec §4.F/§9).
//!
//! Every operation here is best-effort: a missing capability (no
//! `getfacl` on PATH, no SELinux xattr, unsupported filesystem) must not
//! abort the surrounding `create`/`extract` command.

use super::{CaptureOptions, MetaJson, PosixMeta};
use crate::log::VfaLog;
use std::collections::BTreeMap;
use std::path::Path;

#[cfg(unix)]
pub fn capture(path: &Path, meta: &std::fs::Metadata, opts: &CaptureOptions, log: &VfaLog) -> MetaJson {
    use std::os::unix::fs::MetadataExt;

    let mut out = MetaJson::default();

    if opts.posix {
        out.posix = Some(PosixMeta {
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode() & 0o7777,
            atime_ns: meta.atime() * 1_000_000_000 + meta.atime_nsec(),
            mtime_ns: meta.mtime() * 1_000_000_000 + meta.mtime_nsec(),
            ctime_ns: meta.ctime() * 1_000_000_000 + meta.ctime_nsec(),
        });
    }

    if opts.xattrs {
        if let Some(x) = list_xattrs(path) {
            if !x.is_empty() {
                out.xattrs = Some(x);
            }
        }
    }

    if opts.selinux {
        if let Some(ctx) = selinux_get(path) {
            out.xattrs
                .get_or_insert_with(BTreeMap::new)
                .insert("security.selinux".to_string(), hex::encode(&ctx));
            out.selinux = Some(String::from_utf8_lossy(&ctx).into_owned());
        }
    }

    if opts.acl {
        if let Some(dump) = getfacl_dump(path) {
            out.acl = Some(dump);
        } else {
            crate::vlog_debug!(log, "no ACL captured for {}", path.display());
        }
    }

    if opts.sparse {
        let holes = detect_sparse(path);
        if !holes.is_empty() {
            out.holes = Some(holes);
        }
    }

    out
}

#[cfg(unix)]
pub fn apply(path: &Path, meta: &MetaJson, follow_symlinks: bool, opts: &CaptureOptions, log: &VfaLog) {
    use std::os::unix::fs::{chown, lchown};

    if opts.posix {
        if let Some(p) = &meta.posix {
            let result = if follow_symlinks {
                chown(path, Some(p.uid), Some(p.gid))
            } else {
                lchown(path, Some(p.uid), Some(p.gid))
            };
            if let Err(e) = result {
                crate::vlog_debug!(log, "chown {} failed: {e}", path.display());
            }
        }
    }

    if opts.xattrs {
        if let Some(x) = &meta.xattrs {
            apply_xattrs(path, x, log);
        }
    }

    if opts.acl {
        if let Some(dump) = &meta.acl {
            setfacl_restore(dump, path, log);
        }
    }
}

#[cfg(unix)]
fn list_xattrs(path: &Path) -> Option<BTreeMap<String, String>> {
    let names = xattr::list(path).ok()?;
    let mut out = BTreeMap::new();
    for name in names {
        if let Ok(Some(value)) = xattr::get(path, &name) {
            out.insert(name.to_string_lossy().into_owned(), hex::encode(&value));
        }
    }
    Some(out)
}

#[cfg(unix)]
fn apply_xattrs(path: &Path, xattrs: &BTreeMap<String, String>, log: &VfaLog) {
    for (name, hex_value) in xattrs {
        let Ok(value) = hex::decode(hex_value) else { continue };
        if let Err(e) = xattr::set(path, name, &value) {
            crate::vlog_debug!(log, "setxattr {name} on {} failed: {e}", path.display());
        }
    }
}

#[cfg(unix)]
fn getfacl_dump(path: &Path) -> Option<String> {
    let out = std::process::Command::new("getfacl")
        .args(["--absolute-names", "--tabs", "-p", "--"])
        .arg(path)
        .output()
        .ok()?;
    if out.status.success() {
        Some(String::from_utf8_lossy(&out.stdout).into_owned())
    } else {
        None
    }
}

#[cfg(unix)]
fn setfacl_restore(text: &str, path: &Path, log: &VfaLog) {
    use std::io::Write;
    let Ok(mut child) = std::process::Command::new("setfacl")
        .arg("--restore=-")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
    else {
        crate::vlog_debug!(log, "setfacl not available for {}", path.display());
        return;
    };
    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(text.as_bytes());
    }
    let _ = child.wait();
}

#[cfg(unix)]
fn selinux_get(path: &Path) -> Option<Vec<u8>> {
    xattr::get(path, "security.selinux").ok().flatten()
}

#[cfg(target_os = "linux")]
fn detect_sparse(path: &Path) -> Vec<(u64, u64)> {
    use std::fs::File;
    use std::os::unix::io::AsRawFd;

    let mut holes = Vec::new();
    let Ok(file) = File::open(path) else { return holes };
    let fd = file.as_raw_fd();
    let size = match file.metadata() {
        Ok(m) => m.len() as i64,
        Err(_) => return holes,
    };
    let mut pos: i64 = 0;
    while pos < size {
        let data_off = unsafe { libc::lseek(fd, pos, libc::SEEK_DATA) };
        if data_off < 0 {
            break;
        }
        if data_off > pos {
            holes.push((pos as u64, (data_off - pos) as u64));
        }
        let hole_off = unsafe { libc::lseek(fd, data_off, libc::SEEK_HOLE) };
        if hole_off < 0 {
            break;
        }
        pos = hole_off;
    }
    holes
}

#[cfg(not(target_os = "linux"))]
fn detect_sparse(_path: &Path) -> Vec<(u64, u64)> {
    Vec::new()
}

#[cfg(target_os = "linux")]
pub fn punch_hole(file: &std::fs::File, offset: u64, length: u64, log: &VfaLog) {
    use std::os::unix::io::AsRawFd;
    const FALLOC_FL_KEEP_SIZE: i32 = 0x01;
    const FALLOC_FL_PUNCH_HOLE: i32 = 0x02;
    let rc = unsafe {
        libc::fallocate(
            file.as_raw_fd(),
            FALLOC_FL_PUNCH_HOLE | FALLOC_FL_KEEP_SIZE,
            offset as libc::off_t,
            length as libc::off_t,
        )
    };
    if rc != 0 {
        crate::vlog_debug!(log, "fallocate punch-hole at {offset} len {length} failed");
    }
}

#[cfg(not(target_os = "linux"))]
pub fn punch_hole(_file: &std::fs::File, _offset: u64, _length: u64, _log: &VfaLog) {}

#[cfg(not(unix))]
pub fn capture(_path: &Path, _meta: &std::fs::Metadata, _opts: &CaptureOptions, _log: &VfaLog) -> MetaJson {
    MetaJson::default()
}

#[cfg(not(unix))]
pub fn apply(_path: &Path, _meta: &MetaJson, _follow_symlinks: bool, _opts: &CaptureOptions, _log: &VfaLog) {}
