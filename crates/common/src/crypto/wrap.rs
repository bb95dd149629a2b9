//! Per-recipient key wrapping using ECDH + AES Key Wrap
//!
//! This module is how key material crosses user boundaries: every entry in a
//! file's key bundle is a [`WrappedKey`] produced for exactly one recipient.
//! It combines Elliptic Curve Diffie-Hellman (ECDH) for key agreement with
//! AES Key Wrap (RFC 3394) for key encryption.
//!
//! # Protocol Overview
//!
//! To wrap a 32-byte secret for a recipient:
//! 1. **Generate ephemeral keypair**: Create a temporary Ed25519 keypair
//! 2. **Perform ECDH**: Convert keys to X25519 and compute shared secret
//! 3. **Wrap key**: Use AES-KW to encrypt the secret with the shared secret
//! 4. **Package**: Concatenate the ephemeral public key and wrapped secret
//!
//! The recipient recovers the secret by:
//! 1. **Extract ephemeral key**: Read the ephemeral public key from the wrap
//! 2. **Perform ECDH**: Use their private key to compute the same shared secret
//! 3. **Unwrap key**: Use AES-KW to decrypt the secret
//!
//! # Security Properties
//!
//! - **Forward Secrecy**: Ephemeral keys are not stored, so past wraps cannot
//!   be re-derived from a later key compromise of the sender
//! - **Authentication**: The recipient's public key must be known in advance
//! - **Integrity**: AES-KW authenticates the wrapped key; tampering fails unwrap

use std::convert::TryFrom;

use aes_kw::KekAes256 as Kek;
use serde::{Deserialize, Serialize};

use super::content_key::{ContentKey, ContentKeyError, KEY_SIZE};
use super::keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};

/// Size of AES Key Wrap integrity block in bytes
pub const KW_BLOCK_SIZE: usize = 8;
/// Total size of a WrappedKey in bytes
///
/// Layout: ephemeral_pubkey (32) || wrapped_secret (40) = 72 bytes
/// AES-KW adds 8 bytes to the 32-byte secret, resulting in 40 bytes.
pub const WRAPPED_KEY_SIZE: usize = PUBLIC_KEY_SIZE + KEY_SIZE + KW_BLOCK_SIZE;

/// Errors that can occur during key wrapping or recovery
#[derive(Debug, thiserror::Error)]
pub enum WrapError {
    #[error("wrap error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("content key error: {0}")]
    ContentKey(#[from] ContentKeyError),
}

/// A secret wrapped for a specific recipient
///
/// Contains an ephemeral public key and an AES-KW wrapped 32-byte secret.
/// Only the holder of the private half of the recipient key used at wrap time
/// can recover the secret; the wrap itself is safe to persist in plaintext.
///
/// # Wire Format
///
/// ```text
/// [ ephemeral_pubkey: 32 bytes ][ wrapped_secret: 40 bytes ]
/// ```
///
/// # Examples
///
/// ```ignore
/// // Alice hands Bob a file's content key
/// let content_key = ContentKey::generate();
/// let wrap = WrappedKey::wrap(&content_key, &bob_public)?;
///
/// // Bob recovers it with his private key
/// let recovered = wrap.unwrap_key(&bob_secret)?;
/// assert_eq!(content_key, recovered);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct WrappedKey(pub(crate) [u8; WRAPPED_KEY_SIZE]);

impl Serialize for WrappedKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for WrappedKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{Error, Visitor};
        use std::fmt;

        struct WrapVisitor;

        impl<'de> Visitor<'de> for WrapVisitor {
            type Value = WrappedKey;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte array or sequence of WRAPPED_KEY_SIZE")
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: Error,
            {
                if v.len() != WRAPPED_KEY_SIZE {
                    return Err(E::invalid_length(
                        v.len(),
                        &format!("expected {} bytes", WRAPPED_KEY_SIZE).as_str(),
                    ));
                }
                let mut array = [0u8; WRAPPED_KEY_SIZE];
                array.copy_from_slice(v);
                Ok(WrappedKey(array))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut bytes = Vec::new();
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                if bytes.len() != WRAPPED_KEY_SIZE {
                    return Err(A::Error::invalid_length(
                        bytes.len(),
                        &format!("expected {} bytes", WRAPPED_KEY_SIZE).as_str(),
                    ));
                }
                let mut array = [0u8; WRAPPED_KEY_SIZE];
                array.copy_from_slice(&bytes);
                Ok(WrappedKey(array))
            }
        }

        // Try bytes first (for bincode), fallback to seq (for JSON)
        deserializer.deserialize_byte_buf(WrapVisitor)
    }
}

impl Default for WrappedKey {
    fn default() -> Self {
        WrappedKey([0; WRAPPED_KEY_SIZE])
    }
}

impl From<[u8; WRAPPED_KEY_SIZE]> for WrappedKey {
    fn from(bytes: [u8; WRAPPED_KEY_SIZE]) -> Self {
        WrappedKey(bytes)
    }
}

impl TryFrom<&[u8]> for WrappedKey {
    type Error = WrapError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != WRAPPED_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid wrapped key size, expected {}, got {}",
                WRAPPED_KEY_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut wrap = WrappedKey::default();
        wrap.0.copy_from_slice(bytes);
        Ok(wrap)
    }
}

impl WrappedKey {
    /// Parse a wrapped key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, WrapError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; WRAPPED_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff).map_err(|_| anyhow::anyhow!("hex decode error"))?;
        Ok(WrappedKey::from(buff))
    }

    /// Convert wrapped key to hexadecimal string
    #[allow(clippy::wrong_self_convention)]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Wrap 32 bytes of raw secret material for a specific recipient.
    ///
    /// 1. Generates an ephemeral Ed25519 keypair
    /// 2. Converts both keys to X25519 for ECDH
    /// 3. Performs ECDH to derive a shared secret
    /// 4. Uses AES-KW to wrap the material with the shared secret
    /// 5. Returns [ephemeral_pubkey || wrapped_secret]
    ///
    /// # Errors
    ///
    /// Returns an error if key conversion or encryption fails.
    pub fn wrap_bytes(
        secret: &[u8; KEY_SIZE],
        recipient: &PublicKey,
    ) -> Result<Self, WrapError> {
        // Generate ephemeral Ed25519 keypair
        let ephemeral_secret = SecretKey::generate();
        let ephemeral_public = ephemeral_secret.public();

        // Convert both keys to X25519 for ECDH
        let ephemeral_x25519_secret = ephemeral_secret.to_x25519();
        let recipient_x25519_public = recipient.to_x25519()?;

        // Perform ECDH to get shared secret
        let shared_secret = ephemeral_x25519_secret.diffie_hellman(&recipient_x25519_public);

        // Use shared secret as KEK for AES-KW
        let kek = Kek::from(*shared_secret.as_bytes());
        let wrapped = kek
            .wrap_vec(secret)
            .map_err(|_| anyhow::anyhow!("AES-KW wrap error"))?;

        // Build wrap: ephemeral_public_key || wrapped_secret
        let mut out = WrappedKey::default();
        let ephemeral_bytes = ephemeral_public.to_bytes();

        if ephemeral_bytes.len() + wrapped.len() != WRAPPED_KEY_SIZE {
            return Err(anyhow::anyhow!("expected wrapped key size is incorrect").into());
        };

        out.0[..PUBLIC_KEY_SIZE].copy_from_slice(&ephemeral_bytes);
        out.0[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + wrapped.len()].copy_from_slice(&wrapped);

        Ok(out)
    }

    /// Wrap a content key for a specific recipient.
    pub fn wrap(secret: &ContentKey, recipient: &PublicKey) -> Result<Self, WrapError> {
        Self::wrap_bytes(secret, recipient)
    }

    /// Recover the raw 32-byte secret using the recipient's private key.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Key conversion fails
    /// - AES-KW unwrapping fails (wrong key or corrupted data)
    /// - The unwrapped secret has the wrong size
    ///
    /// # Security Note
    ///
    /// A failure here means the wrap was created for a different recipient,
    /// the data was corrupted, or an attacker tampered with it.
    pub fn unwrap_bytes(&self, recipient_secret: &SecretKey) -> Result<[u8; KEY_SIZE], WrapError> {
        // Extract the ephemeral public key
        let ephemeral_public_bytes = &self.0[..PUBLIC_KEY_SIZE];
        let ephemeral_public = PublicKey::try_from(ephemeral_public_bytes)?;

        // Convert keys to X25519 for ECDH
        let recipient_x25519_secret = recipient_secret.to_x25519();
        let ephemeral_x25519_public = ephemeral_public.to_x25519()?;

        // Perform ECDH to get the same shared secret
        let shared_secret = recipient_x25519_secret.diffie_hellman(&ephemeral_x25519_public);

        // Use shared secret as KEK for AES-KW unwrapping
        let kek = Kek::from(*shared_secret.as_bytes());
        let wrapped_data = &self.0[PUBLIC_KEY_SIZE..];

        let unwrapped = kek
            .unwrap_vec(wrapped_data)
            .map_err(|_| anyhow::anyhow!("AES-KW unwrap error"))?;

        if unwrapped.len() != KEY_SIZE {
            return Err(anyhow::anyhow!("unwrapped secret has wrong size").into());
        }

        let mut secret_bytes = [0; KEY_SIZE];
        secret_bytes.copy_from_slice(&unwrapped);
        Ok(secret_bytes)
    }

    /// Recover a wrapped content key using the recipient's private key.
    pub fn unwrap_key(&self, recipient_secret: &SecretKey) -> Result<ContentKey, WrapError> {
        Ok(ContentKey::from(self.unwrap_bytes(recipient_secret)?))
    }

    /// Get a reference to the raw wrap bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}
