//! `MetaJSON` — the per-entry opaque metadata bag (spec §3/§9).
//!
//! Recognized top-level keys parse into typed optional sub-records; any
//! key this build doesn't recognize is kept in `extra` and re-serialized
//! verbatim, so an archive written by a future (or platform-richer) build
//! round-trips through an older one without losing data.

pub mod posix;
pub mod win;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetaJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posix: Option<PosixMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xattrs: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selinux: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holes: Option<Vec<(u64, u64)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardlink_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win: Option<win::WinMeta>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MetaJson {
    pub fn is_empty(&self) -> bool {
        self.posix.is_none()
            && self.xattrs.is_none()
            && self.acl.is_none()
            && self.selinux.is_none()
            && self.holes.is_none()
            && self.link_target.is_none()
            && self.hardlink_to.is_none()
            && self.win.is_none()
            && self.extra.is_empty()
    }

    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }
        serde_json::to_vec(self).ok()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PosixMeta {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub atime_ns: i64,
    pub mtime_ns: i64,
    pub ctime_ns: i64,
}

/// What metadata a `create`/`extract` invocation asked to capture or apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOptions {
    pub posix: bool,
    pub xattrs: bool,
    pub acl: bool,
    pub selinux: bool,
    pub sparse: bool,
    pub win: bool,
}
