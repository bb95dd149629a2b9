//! # Sharing and revocation
//!
//! Granting access hands a user wrapped copies of the file's current keys;
//! the capability token returned by [`Session::share`] is just the file's
//! storage location, which locates the record but decrypts nothing. The
//! recipient must also be named in the bundle.
//!
//! Revocation is the only path that rotates a file's keys after creation.
//! Deleting a bundle entry alone is not revocation — the removed user still
//! holds the old key material — so [`Session::revoke`] removes the entry,
//! rotates both keys, re-wraps fresh copies for everyone who remains, and
//! re-seals the content, all at the unchanged location so every remaining
//! collaborator's recorded location stays valid.

use bytes::Bytes;

use crate::crypto::{ContentKey, PublicKey, SecretKey, WrappedKey};

use super::identity::pk_name;
use super::{RecordId, Session, VaultError};

impl Session {
    /// Grant `recipient` read/write access to `filename`.
    ///
    /// Returns the capability token (the file's storage location) to hand to
    /// the recipient out of band.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if the sharer has no such filename, the
    ///   record is missing from the store, or the recipient has no published
    ///   exchange key
    /// - [`VaultError::AccessRevoked`] if the sharer is no longer in the
    ///   bundle
    /// - [`VaultError::Tampered`] if the fetched record fails verification;
    ///   share never writes back a record it could not verify
    pub async fn share(&self, filename: &str, recipient: &str) -> Result<RecordId, VaultError> {
        let (username, exchange_key, location) = self.file_context(filename)?;

        let recipient_pk = self.lookup_exchange_key(recipient).await?;

        let mut file = self.fetch_record(&location).await?;
        file.verify_signature()?;
        let content_key = self.unwrap_read_key(&file, &username, &exchange_key)?;
        let write_key = self.unwrap_write_key(&file, &username, &exchange_key)?;

        file.bundle_mut()
            .grant(recipient, &recipient_pk, &content_key, &write_key)?;
        file.resign(&write_key)?;

        let blob = file.encode()?;
        self.stores().data().put(*location, Bytes::from(blob)).await?;

        tracing::debug!(filename, recipient, %location, "shared file");
        Ok(location)
    }

    /// Accept a grant for `filename` previously made by `sender` via the
    /// capability token.
    ///
    /// Local bookkeeping only: records the filename→location mapping and
    /// caches this user's wrapped keys. No acknowledgement is sent back;
    /// share and receive are coordinated out of band.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidInput`] if `filename` is empty or already in
    ///   use in this user's namespace
    /// - [`VaultError::NotFound`] if nothing is stored at the token
    /// - [`VaultError::AccessRevoked`] if this user has no bundle entry in
    ///   the record the token points at
    pub async fn receive(
        &self,
        filename: &str,
        sender: &str,
        token: RecordId,
    ) -> Result<(), VaultError> {
        if filename.is_empty() {
            return Err(VaultError::InvalidInput("empty filename".to_string()));
        }
        if self.location_of(filename).is_some() {
            return Err(VaultError::InvalidInput(format!(
                "filename already in use: {filename}"
            )));
        }

        let username = self.username();
        let file = self.fetch_record(&token).await?;
        file.verify_signature()?;

        let read_wrap = *file
            .bundle()
            .reader(&username)
            .ok_or_else(|| VaultError::AccessRevoked(username.clone()))?;
        let write_wrap = file.bundle().writer(&username).copied();

        {
            let mut record = self.record().lock();
            record.files.insert(filename.to_string(), token);
            record.cached_reads.insert(filename.to_string(), read_wrap);
            if let Some(wrap) = write_wrap {
                record.cached_writes.insert(filename.to_string(), wrap);
            }
        }
        self.persist_record().await?;

        tracing::debug!(filename, sender, token = %token, "received file");
        Ok(())
    }

    /// Revoke `target`'s access to `filename`.
    ///
    /// Removes the target from the bundle, rotates the content key and write
    /// keypair, re-wraps fresh copies for every remaining user, and re-seals
    /// the content — all at the unchanged location. The target's retained
    /// key material is useless against the rotated record.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotFound`] if the revoker has no such filename or the
    ///   target is not currently authorized
    /// - [`VaultError::AccessRevoked`] if the revoker is not in the bundle
    pub async fn revoke(&self, filename: &str, target: &str) -> Result<(), VaultError> {
        let (username, exchange_key, location) = self.file_context(filename)?;

        let mut file = self.fetch_record(&location).await?;
        file.verify_signature()?;
        let old_content_key = self.unwrap_read_key(&file, &username, &exchange_key)?;

        if file.bundle().reader(target).is_none() {
            return Err(VaultError::NotFound(format!(
                "{target} is not authorized for {filename}"
            )));
        }

        // recover the plaintext before any key is thrown away
        let content = file.open_content(&old_content_key)?;

        file.bundle_mut().remove(target);

        // rotate both keys; the removed user's retained copies die here
        let content_key = ContentKey::generate();
        let write_key = SecretKey::generate();

        let remaining_readers: Vec<String> = file
            .bundle()
            .reader_names()
            .map(str::to_string)
            .collect();
        let remaining_writers: Vec<String> = file
            .bundle()
            .writer_names()
            .map(str::to_string)
            .collect();

        // fresh read wraps for every remaining reader
        for name in &remaining_readers {
            let pk = self.member_exchange_key(name, &exchange_key).await?;
            let wrap = WrappedKey::wrap(&content_key, &pk)?;
            file.bundle_mut().insert_reader(name, wrap);
        }
        // fresh write wraps for every remaining writer, into the writer map
        for name in &remaining_writers {
            let pk = self.member_exchange_key(name, &exchange_key).await?;
            let wrap = WrappedKey::wrap_bytes(&write_key.to_bytes(), &pk)?;
            file.bundle_mut().insert_writer(name, wrap);
        }
        file.bundle_mut().set_verify_key(write_key.public());

        file.reseal(&content, &content_key, &write_key)?;
        let blob = file.encode()?;
        self.stores().data().put(*location, Bytes::from(blob)).await?;

        // refresh this user's cached wraps
        let (read_wrap, write_wrap) = {
            let bundle = file.bundle();
            (
                bundle.reader(&username).copied(),
                bundle.writer(&username).copied(),
            )
        };
        {
            let mut record = self.record().lock();
            if let Some(wrap) = read_wrap {
                record.cached_reads.insert(filename.to_string(), wrap);
            }
            if let Some(wrap) = write_wrap {
                record.cached_writes.insert(filename.to_string(), wrap);
            }
        }
        self.persist_record().await?;

        tracing::debug!(filename, target, %location, "revoked access and rotated keys");
        Ok(())
    }

    /// Look up a user's published exchange key, failing with `NotFound` if
    /// the name is unregistered.
    async fn lookup_exchange_key(&self, username: &str) -> Result<PublicKey, VaultError> {
        let name = pk_name(username);
        let bytes = self
            .stores()
            .keys()
            .lookup(&name)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("no published key for {username}")))?;
        Ok(PublicKey::try_from(bytes.as_ref())?)
    }

    /// Exchange key for a bundle member during rekey: our own key is derived
    /// locally, everyone else's comes from the keystore.
    async fn member_exchange_key(
        &self,
        member: &str,
        own_exchange: &SecretKey,
    ) -> Result<PublicKey, VaultError> {
        if member == self.username() {
            Ok(own_exchange.public())
        } else {
            self.lookup_exchange_key(member).await
        }
    }
}
