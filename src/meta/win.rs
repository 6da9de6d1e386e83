//! Windows metadata capture/apply — attributes, file times, security
//! descriptor, alternate data streams (spec §3/§9).
//!
//! No Windows-metadata crate appears anywhere in the retrieval pack this
//! crate was grounded on, so this adapter sticks to what `std` exposes on
//! `cfg(windows)` (attributes and times via `MetadataExt`) and is a no-op
//! for SDDL/ADS and on every other target, exactly the "capability
//! interface" shape spec §9 calls for.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WinMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attrs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sddl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ads: Option<Vec<AdsEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdsEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[cfg(windows)]
pub fn capture(_path: &Path, meta: &std::fs::Metadata) -> Option<WinMeta> {
    use std::os::windows::fs::MetadataExt;
    // Windows FILETIMEs are 100ns ticks since 1601; kept in that unit so a
    // round trip through this build's `apply` needs no epoch conversion.
    Some(WinMeta {
        attrs: Some(meta.file_attributes()),
        ctime: Some(meta.creation_time() as i64),
        atime: Some(meta.last_access_time() as i64),
        mtime: Some(meta.last_write_time() as i64),
        sddl: None,
        ads: None,
    })
}

#[cfg(windows)]
pub fn apply(_path: &Path, _meta: &WinMeta, _is_dir: bool) {
    // Setting attributes/SDDL/ADS needs APIs std doesn't expose; left
    // best-effort no-op until a Windows security crate enters the stack.
}

#[cfg(not(windows))]
pub fn capture(_path: &Path, _meta: &std::fs::Metadata) -> Option<WinMeta> {
    None
}

#[cfg(not(windows))]
pub fn apply(_path: &Path, _meta: &WinMeta, _is_dir: bool) {}
