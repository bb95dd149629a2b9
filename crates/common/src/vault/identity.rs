//! # Identity
//!
//! A user's entire identity is derived from (username, password): the master
//! secret locates and unlocks the sealed [`UserRecord`], so login needs no
//! stored index. The record carries the user's two long-term keypairs and
//! their filename bookkeeping.
//!
//! Registration publishes the public key halves to the keystore under
//! `<username>.pk` (exchange) and `<username>.vk` (verify). Both names are
//! first-write-wins; a collision fails registration outright rather than
//! silently re-binding an existing identity to new keys.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::crypto::{derive_master_key, KdfParams, SecretKey, WrappedKey};
use crate::sealed;

use super::session::Session;
use super::{RecordId, Stores, VaultError};

/// Keystore name for a user's exchange public key.
pub(crate) fn pk_name(username: &str) -> String {
    format!("{username}.pk")
}

/// Keystore name for a user's signature verify key.
pub(crate) fn vk_name(username: &str) -> String {
    format!("{username}.vk")
}

/// The persisted per-user record, sealed under a password-derived key.
///
/// Created once at registration and mutated in place whenever the user
/// stores, shares, receives, or revokes a file. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Immutable, unique username.
    pub(crate) username: String,
    /// Long-term exchange keypair (key wrapping); generated at registration,
    /// never rotated.
    pub(crate) exchange_key: SecretKey,
    /// Long-term signing keypair (identity signatures); generated at
    /// registration, never rotated.
    pub(crate) signing_key: SecretKey,
    /// filename → storage location of that file's record.
    pub(crate) files: BTreeMap<String, RecordId>,
    /// filename → cached wrapped copy of the file's content key.
    ///
    /// Performance hint only: the authoritative copies live in each file's
    /// key bundle, and every operation re-reads the bundle, so a revocation
    /// performed elsewhere is observed immediately.
    pub(crate) cached_reads: BTreeMap<String, WrappedKey>,
    /// filename → cached wrapped copy of the file's write-key seed.
    pub(crate) cached_writes: BTreeMap<String, WrappedKey>,
}

impl UserRecord {
    fn new(username: String, exchange_key: SecretKey, signing_key: SecretKey) -> Self {
        UserRecord {
            username,
            exchange_key,
            signing_key,
            files: BTreeMap::new(),
            cached_reads: BTreeMap::new(),
            cached_writes: BTreeMap::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Filenames this user currently has a location mapping for.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl Session {
    /// Create a new account and return a live session.
    ///
    /// Uses production Argon2id parameters; see
    /// [`register_with`](Self::register_with) to override them.
    pub async fn register(
        stores: &Stores,
        username: &str,
        password: &str,
    ) -> Result<Self, VaultError> {
        Self::register_with(stores, username, password, &KdfParams::default()).await
    }

    /// Create a new account with explicit KDF parameters.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidInput`] if username or password is empty
    /// - [`VaultError::KeyPublish`] if either keystore name is already bound
    pub async fn register_with(
        stores: &Stores,
        username: &str,
        password: &str,
        params: &KdfParams,
    ) -> Result<Self, VaultError> {
        if username.is_empty() || password.is_empty() {
            return Err(VaultError::InvalidInput(
                "username and password must be non-empty".to_string(),
            ));
        }

        // Refuse to re-bind an existing identity before touching anything.
        for name in [pk_name(username), vk_name(username)] {
            if stores.keys().lookup(&name).await?.is_some() {
                return Err(VaultError::KeyPublish(name));
            }
        }

        let master = derive_master_key(username, password, params)?;
        let record_key = master.record_key();
        let record_id = RecordId::from(master.record_location());

        let exchange_key = SecretKey::generate();
        let signing_key = SecretKey::generate();

        stores
            .keys()
            .register(
                &pk_name(username),
                Bytes::copy_from_slice(&exchange_key.public().to_bytes()),
            )
            .await?;
        stores
            .keys()
            .register(
                &vk_name(username),
                Bytes::copy_from_slice(&signing_key.public().to_bytes()),
            )
            .await?;

        let record = UserRecord::new(username.to_string(), exchange_key, signing_key);
        let session = Session::from_parts(
            Arc::new(Mutex::new(record)),
            record_key,
            record_id,
            stores.clone(),
        );
        session.persist_record().await?;

        tracing::debug!(username, "registered new user");
        Ok(session)
    }

    /// Authenticate an existing account and return a live session.
    pub async fn login(
        stores: &Stores,
        username: &str,
        password: &str,
    ) -> Result<Self, VaultError> {
        Self::login_with(stores, username, password, &KdfParams::default()).await
    }

    /// Authenticate with explicit KDF parameters (must match registration).
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if nothing is stored at the derived
    ///   location; an unknown username and a wrong password both land here
    /// - [`VaultError::Tampered`] if the sealed record fails authentication
    pub async fn login_with(
        stores: &Stores,
        username: &str,
        password: &str,
        params: &KdfParams,
    ) -> Result<Self, VaultError> {
        if username.is_empty() || password.is_empty() {
            return Err(VaultError::InvalidInput(
                "username and password must be non-empty".to_string(),
            ));
        }

        let master = derive_master_key(username, password, params)?;
        let record_key = master.record_key();
        let record_id = RecordId::from(master.record_location());

        let blob = stores
            .data()
            .get(&record_id)
            .await?
            .ok_or_else(|| VaultError::NotFound("unknown username or wrong password".to_string()))?;

        let plaintext = sealed::open(&record_key, &blob)?;
        let record: UserRecord = bincode::deserialize(&plaintext)?;

        if record.username != username {
            // the record authenticated under our key but names someone else;
            // only a tampering store can produce this
            return Err(VaultError::Tampered("user record username".to_string()));
        }

        tracing::debug!(username, files = record.files.len(), "login");
        Ok(Session::from_parts(
            Arc::new(Mutex::new(record)),
            record_key,
            record_id,
            stores.clone(),
        ))
    }
}

impl Session {
    /// Seal and write the user record at its derived location.
    pub(crate) async fn persist_record(&self) -> Result<(), VaultError> {
        let (snapshot, record_key, record_id) = {
            let record = self.record().lock();
            (record.clone(), self.record_key().clone(), self.record_id())
        };
        let plaintext = bincode::serialize(&snapshot)?;
        let blob = sealed::seal(&record_key, &plaintext)?;
        self.stores()
            .data()
            .put(*record_id, Bytes::from(blob))
            .await?;
        Ok(())
    }
}
