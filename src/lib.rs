//! # vfa — Vulpfin Archive (.vfa) reference implementation
//!
//! Format guarantees (frozen at v1):
//! - All numeric fields are little-endian; widths are fixed by the header
//!   and TOC field list, never negotiated.
//! - The header is fully self-describing; parsing it never needs the
//!   footer, which is the archive's sole commit point (its end magic is
//!   the last five bytes written).
//! - Every block frame is `LE32 len ‖ u8 method ‖ payload`; compression
//!   method identity is a closed, frozen set of five byte tags.
//! - AEAD nonces are never random: every seal derives its nonce from the
//!   header's nonce prefix and a monotonically increasing block index, so
//!   append-without-re-encoding can never reuse one.
//! - The TOC sits between the block stream and the footer; locating it
//!   requires the footer (streaming decode without a footer is out of
//!   scope — see `spec.md` §1).

pub mod codec;
pub mod crypto;
pub mod error;
pub mod footer;
pub mod header;
pub mod log;
pub mod meta;
pub mod reader;
pub mod toc;
pub mod verify;
pub mod walk;
pub mod writer;

pub use error::VfaError;
pub use header::Header;
pub use toc::{Entry, Kind, Toc};
