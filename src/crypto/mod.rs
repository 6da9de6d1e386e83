//! AEAD encryption and key derivation.
//!
//! Only AES-256-GCM (AEAD id 1) is supported. Key derivation is Argon2id
//! (KDF id 1, preferred) or scrypt (KDF id 2, fallback when the archive was
//! written with a build that lacked Argon2 support). Nonces are never
//! random: every block's nonce is deterministically derived from the
//! archive's nonce prefix and a monotonically increasing index, so a
//! decrypt failure always means either a wrong password or corruption, not
//! nonce confusion (spec §3/§4.B).

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const KDF_NONE:     u8 = 0;
pub const KDF_ARGON2ID: u8 = 1;
pub const KDF_SCRYPT:   u8 = 2;

pub const AEAD_NONE:    u8 = 0;
pub const AEAD_AESGCM:  u8 = 1;

/// Sentinel block index the TOC is always sealed under.
pub const TOC_NONCE_INDEX: u64 = u64::MAX;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed — wrong password or corrupted data")]
    DecryptionFailed,
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("unknown KDF id {0}")]
    UnknownKdf(u8),
    #[error("unknown AEAD id {0}")]
    UnknownAead(u8),
}

#[derive(Debug, Clone, Copy)]
pub struct KdfParams {
    pub kdf_id: u8,
    pub t: u32,
    pub m: u32,
    pub p: u8,
}

impl KdfParams {
    pub fn default_argon2id() -> Self {
        Self { kdf_id: KDF_ARGON2ID, t: 3, m: 256 * 1024, p: 4 }
    }
    pub fn default_scrypt() -> Self {
        Self { kdf_id: KDF_SCRYPT, t: 32768, m: 8, p: 1 }
    }
}

/// Derive a 256-bit key from a password, a 16-byte salt, and the stored KDF
/// parameters. `t`/`m`/`p` are reused verbatim from the header so a reader
/// reproduces the exact key the writer used.
pub fn derive_key(password: &str, salt: &[u8; 16], params: KdfParams) -> Result<[u8; 32], CryptoError> {
    match params.kdf_id {
        KDF_ARGON2ID => {
            use argon2::{Algorithm, Argon2, Params, Version};
            let p = Params::new(params.m, params.t, params.p as u32, Some(32))
                .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
            let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, p);
            let mut key = [0u8; 32];
            argon2.hash_password_into(password.as_bytes(), salt, &mut key)
                .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
            Ok(key)
        }
        KDF_SCRYPT => {
            use scrypt::{scrypt, Params};
            // `params.t` stores N itself (spec §4.B); scrypt::Params wants log2(N).
            let log_n = params.t.max(1).ilog2() as u8;
            let p = Params::new(log_n, params.m, params.p as u32, 32)
                .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
            let mut key = [0u8; 32];
            scrypt(password.as_bytes(), salt, &p, &mut key)
                .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
            Ok(key)
        }
        other => Err(CryptoError::UnknownKdf(other)),
    }
}

/// `SHA256(nonce_prefix ‖ LE64(index) ‖ "vfa-nonce")[:12]` — spec §3/§4.B.
pub fn nonce_from(nonce_prefix: &[u8; 12], index: u64) -> [u8; 12] {
    let mut hasher = Sha256::new();
    hasher.update(nonce_prefix);
    hasher.update(index.to_le_bytes());
    hasher.update(b"vfa-nonce");
    let digest = hasher.finalize();
    let mut out = [0u8; 12];
    out.copy_from_slice(&digest[..12]);
    out
}

/// AES-256-GCM seal under a deterministically derived nonce and label-bound AAD.
pub fn encrypt(key: &[u8; 32], nonce_prefix: &[u8; 12], index: u64, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::EncryptionFailed)?;
    let nonce_bytes = nonce_from(nonce_prefix, index);
    let nonce = Nonce::from_slice(&nonce_bytes);
    cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::EncryptionFailed)
}

pub fn decrypt(key: &[u8; 32], nonce_prefix: &[u8; 12], index: u64, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::DecryptionFailed)?;
    let nonce_bytes = nonce_from(nonce_prefix, index);
    let nonce = Nonce::from_slice(&nonce_bytes);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::DecryptionFailed)
}

pub const AAD_DATA: &[u8] = b"vfa-data";
pub const AAD_TOC:  &[u8] = b"vfa-toc";
