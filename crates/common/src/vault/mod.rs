//! The vault: authenticated, shareable, revocable file objects
//!
//! This module owns everything above the crypto primitives and below the
//! caller: user records and authentication ([`identity`]), per-file key
//! bundles ([`bundle`]), the on-store file record layout ([`record`]), and
//! the live [`Session`] with its store/load/append and share/receive/revoke
//! operations.
//!
//! ## Trust model
//!
//! The datastore and keystore are passively adversarial: anything they return
//! may have been altered or withheld. Every read is authenticated (AEAD seal,
//! AES-KW wrap, or Ed25519 signature) before use, and verification failures
//! surface as errors immediately; they are never retried or masked.
//!
//! ## Atomicity
//!
//! Every write path assembles the complete new blob in memory first; the
//! single `put` is the last step, so a failure mid-computation leaves stored
//! state untouched. There is no cross-location atomicity: concurrent writers
//! racing on one file are last-write-wins, serialized (if needed) above this
//! layer.

mod bundle;
mod identity;
mod record;
mod session;
mod sharing;

pub use bundle::KeyBundle;
pub use identity::UserRecord;
pub use session::Session;

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::{KeyError, WrapError};
use crate::sealed::frame::FrameError;
use crate::sealed::SealedError;
use store::{Datastore, Keystore, StoreError, ID_SIZE};

/// A 32-byte datastore location identifier.
///
/// Identifies a user record or file record in the datastore. File locations
/// are random and stable for the life of the file (share and revoke never
/// move a record); user record locations are derived from credentials. A
/// `RecordId` is also the capability token handed from sharer to recipient:
/// it locates a record but decrypts nothing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct RecordId([u8; ID_SIZE]);

impl Deref for RecordId {
    type Target = [u8; ID_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; ID_SIZE]> for RecordId {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        RecordId(bytes)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl RecordId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        let mut buff = [0; ID_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        RecordId(buff)
    }

    /// Parse an identifier from a hexadecimal string.
    pub fn from_hex(hex: &str) -> Result<Self, VaultError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; ID_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| VaultError::InvalidInput("record id hex decode error".to_string()))?;
        Ok(RecordId(buff))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_bytes(&self) -> [u8; ID_SIZE] {
        self.0
    }
}

/// The injected external services every session operates against.
///
/// Both are trait objects so tests and deployments can substitute any
/// backend; nothing in the core reaches a store through a global.
#[derive(Clone)]
pub struct Stores {
    data: Arc<dyn Datastore>,
    keys: Arc<dyn Keystore>,
}

impl Stores {
    pub fn new(data: Arc<dyn Datastore>, keys: Arc<dyn Keystore>) -> Self {
        Self { data, keys }
    }

    pub fn data(&self) -> &dyn Datastore {
        self.data.as_ref()
    }

    pub fn keys(&self) -> &dyn Keystore {
        self.keys.as_ref()
    }
}

/// Errors surfaced by vault operations.
///
/// The first six variants are the protocol's error taxonomy; the rest carry
/// lower-level causes upward.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Empty or malformed caller arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No record at the expected location, or unknown filename/user.
    #[error("not found: {0}")]
    NotFound(String),

    /// An authentication check failed on stored bytes: the store or a
    /// man-in-the-middle altered them.
    #[error("tampered: {0}")]
    Tampered(String),

    /// Structurally invalid framing or encoding, caught before or after
    /// authentication.
    #[error("malformed: {0}")]
    Malformed(String),

    /// The caller authenticated fine but is absent from the file's current
    /// key bundle.
    #[error("access revoked for {0}")]
    AccessRevoked(String),

    /// Keystore registration collision: the identity name is already bound.
    #[error("keystore name already registered: {0}")]
    KeyPublish(String),

    #[error("wrap error: {0}")]
    Wrap(#[from] WrapError),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("vault error: {0}")]
    Default(#[from] anyhow::Error),
}

impl From<SealedError> for VaultError {
    fn from(err: SealedError) -> Self {
        match err {
            SealedError::Tampered => VaultError::Tampered("sealed record".to_string()),
            SealedError::Malformed(msg) => VaultError::Malformed(msg),
            SealedError::Seal(e) => VaultError::Default(e),
        }
    }
}

impl From<FrameError> for VaultError {
    fn from(err: FrameError) -> Self {
        VaultError::Malformed(err.to_string())
    }
}

impl From<bincode::Error> for VaultError {
    fn from(err: bincode::Error) -> Self {
        VaultError::Malformed(format!("record decode: {err}"))
    }
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NameTaken(name) => VaultError::KeyPublish(name),
            other => VaultError::Store(other),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_id_hex_roundtrip() {
        let id = RecordId::generate();
        let hex = id.to_hex();
        assert_eq!(RecordId::from_hex(&hex).unwrap(), id);
        assert_eq!(RecordId::from_hex(&format!("0x{hex}")).unwrap(), id);
    }

    #[test]
    fn test_record_ids_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn test_error_taxonomy_mapping() {
        let err: VaultError = SealedError::Tampered.into();
        assert!(matches!(err, VaultError::Tampered(_)));

        let err: VaultError = SealedError::Malformed("short".to_string()).into();
        assert!(matches!(err, VaultError::Malformed(_)));

        let err: VaultError = FrameError::TooShort(0).into();
        assert!(matches!(err, VaultError::Malformed(_)));

        let err: VaultError = StoreError::NameTaken("alice.pk".to_string()).into();
        assert!(matches!(err, VaultError::KeyPublish(_)));
    }
}
