//! Sealed record codec
//!
//! Every object persisted to the datastore goes through this codec: the user
//! record, file content, and (via per-recipient key wraps) the key bundle.
//! Callers never hand raw plaintext to the store, and never trust a fetched
//! blob before [`open`] has authenticated it.
//!
//! The envelope is ChaCha20-Poly1305 AEAD with a fresh random nonce per seal:
//!
//! ```text
//! [ nonce: 12 bytes ][ ciphertext ][ auth tag: 16 bytes ]
//! ```
//!
//! Records that co-locate several parts in one storage slot (file content +
//! key bundle + write signature) are framed with [`frame`], a tagged,
//! versioned, length-prefixed envelope that validates every boundary before
//! slicing.

pub mod frame;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::crypto::ContentKey;

/// Size of a ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of a Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Errors that can occur opening a sealed record
#[derive(Debug, thiserror::Error)]
pub enum SealedError {
    /// Authentication failed: the blob was altered after sealing, or the key
    /// is wrong. Irrecoverable; never retried.
    #[error("sealed record failed authentication")]
    Tampered,

    /// The blob is structurally invalid before authentication was even
    /// possible (shorter than the minimum envelope).
    #[error("sealed record malformed: {0}")]
    Malformed(String),

    /// Sealing itself failed (RNG or cipher error).
    #[error("seal error: {0}")]
    Seal(#[from] anyhow::Error),
}

/// Seal `plaintext` under `key`.
///
/// Output: `nonce || ciphertext || tag`. A fresh random nonce is generated
/// for every call, so sealing the same plaintext twice yields different blobs.
pub fn seal(key: &ContentKey, plaintext: &[u8]) -> Result<Vec<u8>, SealedError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| anyhow::anyhow!("encrypt error"))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed blob under `key`.
///
/// # Errors
///
/// - [`SealedError::Malformed`] if the blob is shorter than the minimum
///   envelope (nonce + tag)
/// - [`SealedError::Tampered`] if authentication fails: any altered byte of
///   nonce, ciphertext or tag, or a wrong key
pub fn open(key: &ContentKey, blob: &[u8]) -> Result<Vec<u8>, SealedError> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(SealedError::Malformed(format!(
            "blob too short: {} bytes (minimum {})",
            blob.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.bytes()));
    let nonce = Nonce::from_slice(&blob[..NONCE_SIZE]);

    cipher
        .decrypt(nonce, &blob[NONCE_SIZE..])
        .map_err(|_| SealedError::Tampered)
}
