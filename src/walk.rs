//! Filesystem walker (spec §4.F).
//!
//! Produces a deterministic, finite sequence of items: for a directory
//! root, the directory itself first (so empty directories round-trip),
//! then its immediate files and symlinks, then its subdirectories
//! recursively in the same shape. A root that is itself a file or symlink
//! yields just that one item. Regular files sharing a (device, inode) pair
//! collapse into one `File` plus `HardLink` items for every later sighting.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub enum WalkKind {
    Dir,
    File,
    Symlink { target: String },
    HardLink { target: String },
}

#[derive(Debug, Clone)]
pub struct WalkItem {
    /// Path as recorded in the TOC — the literal path string the walker
    /// encountered, relative or absolute exactly as the root argument was.
    pub path: String,
    pub fs_path: PathBuf,
    pub metadata: fs::Metadata,
    pub kind: WalkKind,
}

#[cfg(unix)]
type HardlinkKey = (u64, u64);

#[cfg(unix)]
fn hardlink_key(meta: &fs::Metadata) -> Option<HardlinkKey> {
    use std::os::unix::fs::MetadataExt;
    if meta.nlink() > 1 {
        Some((meta.dev(), meta.ino()))
    } else {
        None
    }
}

#[cfg(not(unix))]
fn hardlink_key(_meta: &fs::Metadata) -> Option<(u64, u64)> {
    None
}

pub fn walk_roots(roots: &[PathBuf]) -> io::Result<Vec<WalkItem>> {
    let mut items = Vec::new();
    let mut seen: HashMap<(u64, u64), String> = HashMap::new();
    for root in roots {
        let meta = fs::symlink_metadata(root)?;
        let path_str = root.to_string_lossy().into_owned();
        if meta.is_dir() {
            walk_dir(root, &path_str, &mut items, &mut seen)?;
        } else {
            push_leaf(root, &path_str, meta, &mut items, &mut seen)?;
        }
    }
    Ok(items)
}

/// Order siblings so files and symlinks sort before subdirectories, and
/// alphabetically within each group — this is what turns `WalkDir`'s plain
/// pre-order traversal into "directory tuple, then its files and symlinks,
/// then its subdirectories" without a manual recursive walk.
fn sibling_order(a: &walkdir::DirEntry, b: &walkdir::DirEntry) -> Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();
    match (a_dir, b_dir) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => a.file_name().cmp(b.file_name()),
    }
}

fn walk_dir(
    dir: &Path,
    dir_str: &str,
    items: &mut Vec<WalkItem>,
    seen: &mut HashMap<(u64, u64), String>,
) -> io::Result<()> {
    for entry in WalkDir::new(dir).follow_links(false).sort_by(sibling_order) {
        let entry = entry.map_err(io::Error::from)?;
        let meta = entry.metadata().map_err(io::Error::from)?;

        let rel = entry.path().strip_prefix(dir).unwrap_or_else(|_| entry.path());
        let path_str = if rel.as_os_str().is_empty() {
            dir_str.to_string()
        } else {
            let rel_str = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            format!("{}/{}", dir_str.trim_end_matches('/'), rel_str)
        };

        if entry.depth() == 0 {
            items.push(WalkItem {
                path: path_str,
                fs_path: entry.path().to_path_buf(),
                metadata: meta,
                kind: WalkKind::Dir,
            });
            continue;
        }

        if meta.is_dir() {
            items.push(WalkItem {
                path: path_str,
                fs_path: entry.path().to_path_buf(),
                metadata: meta,
                kind: WalkKind::Dir,
            });
        } else {
            push_leaf(entry.path(), &path_str, meta, items, seen)?;
        }
    }
    Ok(())
}

fn push_leaf(
    path: &Path,
    path_str: &str,
    meta: fs::Metadata,
    items: &mut Vec<WalkItem>,
    seen: &mut HashMap<(u64, u64), String>,
) -> io::Result<()> {
    if meta.file_type().is_symlink() {
        let target = fs::read_link(path)?.to_string_lossy().into_owned();
        items.push(WalkItem {
            path: path_str.to_string(),
            fs_path: path.to_path_buf(),
            metadata: meta,
            kind: WalkKind::Symlink { target },
        });
        return Ok(());
    }

    if let Some(key) = hardlink_key(&meta) {
        if let Some(first) = seen.get(&key) {
            items.push(WalkItem {
                path: path_str.to_string(),
                fs_path: path.to_path_buf(),
                metadata: meta,
                kind: WalkKind::HardLink { target: first.clone() },
            });
            return Ok(());
        }
        seen.insert(key, path_str.to_string());
    }

    items.push(WalkItem {
        path: path_str.to_string(),
        fs_path: path.to_path_buf(),
        metadata: meta,
        kind: WalkKind::File,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_directory_round_trips_as_single_item() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("d");
        fs::create_dir(&sub).unwrap();
        let items = walk_roots(&[sub.clone()]).unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].kind, WalkKind::Dir));
    }

    #[test]
    fn directory_precedes_its_files() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("d");
        fs::create_dir(&sub).unwrap();
        let mut f = fs::File::create(sub.join("a.txt")).unwrap();
        f.write_all(b"hello").unwrap();
        let items = walk_roots(&[sub]).unwrap();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0].kind, WalkKind::Dir));
        assert!(matches!(items[1].kind, WalkKind::File));
    }

    #[test]
    fn files_precede_subdirectories_at_the_same_level() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let items = walk_roots(&[dir.path().to_path_buf()]).unwrap();
        // root dir, a.txt, then the "d" subdirectory.
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0].kind, WalkKind::Dir));
        assert!(matches!(items[1].kind, WalkKind::File));
        assert!(matches!(items[2].kind, WalkKind::Dir));
    }

    #[cfg(unix)]
    #[test]
    fn second_hardlink_sighting_collapses() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("f");
        fs::write(&f, b"x").unwrap();
        let g = dir.path().join("g");
        fs::hard_link(&f, &g).unwrap();
        let items = walk_roots(&[f.clone(), g.clone()]).unwrap();
        assert!(matches!(items[0].kind, WalkKind::File));
        match &items[1].kind {
            WalkKind::HardLink { target } => assert_eq!(target, &f.to_string_lossy()),
            other => panic!("expected hardlink, got {other:?}"),
        }
    }
}
