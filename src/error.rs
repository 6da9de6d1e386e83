//! Crate-wide error type.
//!
//! Every component has its own `thiserror` enum (`codec::CodecError`,
//! `crypto::CryptoError`, `header::HeaderError`, `toc::TocError`,
//! `footer::FooterError`); [`VfaError`] unifies them for callers that don't
//! care which layer failed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfaError {
    #[error(transparent)]
    Header(#[from] crate::header::HeaderError),

    #[error(transparent)]
    Toc(#[from] crate::toc::TocError),

    #[error(transparent)]
    Footer(#[from] crate::footer::FooterError),

    #[error(transparent)]
    Codec(#[from] crate::codec::CodecError),

    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),

    #[error("operation not permitted: {0}")]
    Policy(#[from] PolicyError),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("cannot append to a solid-mode archive")]
    AppendOnSolid,
    #[error("archive is encrypted but no password was supplied")]
    MissingPassword,
    #[error("wrong password or corrupted TOC")]
    WrongPassword,
}
