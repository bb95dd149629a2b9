//! Per-file symmetric content keys
//!
//! Each file record is sealed under its own [`ContentKey`], providing:
//! - **Per-file encryption**: compromising one key doesn't affect other files
//! - **Cheap revocation**: rotating one file's key never touches other files

use std::ops::Deref;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Size of a ChaCha20-Poly1305 key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Errors that can occur constructing a content key
#[derive(Debug, thiserror::Error)]
pub enum ContentKeyError {
    #[error("content key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A 256-bit symmetric key for sealing a single record
///
/// Used as the input key of the sealed record codec for file content, and
/// (derived from the master secret) for the user record. Zeroized on drop.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentKey([u8; KEY_SIZE]);

impl Deref for ContentKey {
    type Target = [u8; KEY_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; KEY_SIZE]> for ContentKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        ContentKey(bytes)
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl ContentKey {
    /// Generate a new random content key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut buff = [0; KEY_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    /// Create a content key from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `KEY_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, ContentKeyError> {
        if data.len() != KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid content key size, expected {}, got {}",
                KEY_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0; KEY_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}
