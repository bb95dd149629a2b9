//! # Sessions
//!
//! A [`Session`] is the live handle a caller holds after registration or
//! login: the decrypted user record behind a mutex, the password-derived
//! record key and location, and the injected stores. All file operations go
//! through it.
//!
//! Sessions are cheap to clone and share; the protocol itself is stateless
//! between calls apart from this object.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::crypto::{ContentKey, PublicKey, SecretKey};

use super::bundle::KeyBundle;
use super::identity::UserRecord;
use super::record::FileRecord;
use super::{RecordId, Stores, VaultError};

/// A live, authenticated user session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<UserRecord>>,
    record_key: ContentKey,
    record_id: RecordId,
    stores: Stores,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("record_id", &self.record_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn from_parts(
        inner: Arc<Mutex<UserRecord>>,
        record_key: ContentKey,
        record_id: RecordId,
        stores: Stores,
    ) -> Self {
        Session {
            inner,
            record_key,
            record_id,
            stores,
        }
    }

    pub(crate) fn record(&self) -> &Arc<Mutex<UserRecord>> {
        &self.inner
    }

    pub(crate) fn record_key(&self) -> &ContentKey {
        &self.record_key
    }

    pub(crate) fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub(crate) fn stores(&self) -> &Stores {
        &self.stores
    }

    /// The session's username.
    pub fn username(&self) -> String {
        self.inner.lock().username.clone()
    }

    /// The session's exchange public key (as published under `<user>.pk`).
    pub fn exchange_public(&self) -> PublicKey {
        self.inner.lock().exchange_key.public()
    }

    /// Filenames this user currently tracks.
    pub fn filenames(&self) -> Vec<String> {
        self.inner.lock().files.keys().cloned().collect()
    }

    /// The storage location recorded for `filename`, if any.
    pub fn location_of(&self, filename: &str) -> Option<RecordId> {
        self.inner.lock().files.get(filename).copied()
    }

    /// Store `content` under `filename`.
    ///
    /// First store of a filename creates the file: fresh content key, fresh
    /// write keypair, a bundle containing only this user, and a fresh stable
    /// location. Storing an existing filename overwrites in place: same
    /// location, same content key, bundle untouched.
    pub async fn store(&self, filename: &str, content: &[u8]) -> Result<(), VaultError> {
        if filename.is_empty() {
            return Err(VaultError::InvalidInput("empty filename".to_string()));
        }

        let (username, exchange_key, existing) = {
            let record = self.inner.lock();
            (
                record.username.clone(),
                record.exchange_key.clone(),
                record.files.get(filename).copied(),
            )
        };

        match existing {
            Some(location) => {
                // overwrite: reuse location and keys; keys come from the
                // authoritative bundle, not the cache
                let mut file = self.fetch_record(&location).await?;
                file.verify_signature()?;
                let content_key = self.unwrap_read_key(&file, &username, &exchange_key)?;
                let write_key = self.unwrap_write_key(&file, &username, &exchange_key)?;

                file.reseal(content, &content_key, &write_key)?;
                let blob = file.encode()?;
                self.stores.data().put(*location, Bytes::from(blob)).await?;

                tracing::debug!(filename, %location, len = content.len(), "overwrote file");
            }
            None => {
                let content_key = ContentKey::generate();
                let write_key = SecretKey::generate();
                let location = RecordId::generate();

                let bundle = KeyBundle::new(
                    &username,
                    &exchange_key.public(),
                    &content_key,
                    &write_key,
                )?;
                let read_wrap = *bundle.reader(&username).expect("owner just granted");
                let write_wrap = *bundle.writer(&username).expect("owner just granted");

                let file = FileRecord::seal(content, &content_key, &write_key, bundle)?;
                let blob = file.encode()?;
                self.stores.data().put(*location, Bytes::from(blob)).await?;

                {
                    let mut record = self.inner.lock();
                    record.files.insert(filename.to_string(), location);
                    record.cached_reads.insert(filename.to_string(), read_wrap);
                    record
                        .cached_writes
                        .insert(filename.to_string(), write_wrap);
                }
                self.persist_record().await?;

                tracing::debug!(filename, %location, len = content.len(), "stored new file");
            }
        }

        Ok(())
    }

    /// Load the current content of `filename`.
    pub async fn load(&self, filename: &str) -> Result<Vec<u8>, VaultError> {
        let (username, exchange_key, location) = self.file_context(filename)?;

        let file = self.fetch_record(&location).await?;
        file.verify_signature()?;
        let content_key = self.unwrap_read_key(&file, &username, &exchange_key)?;
        let content = file.open_content(&content_key)?;

        tracing::debug!(filename, %location, len = content.len(), "loaded file");
        Ok(content)
    }

    /// Append `extra` to the current content of `filename`.
    ///
    /// Read-modify-write at the same location under the same content key;
    /// the co-located bundle is carried through untouched. Requires write
    /// access: producing the new signature needs the file's write key.
    pub async fn append(&self, filename: &str, extra: &[u8]) -> Result<(), VaultError> {
        let (username, exchange_key, location) = self.file_context(filename)?;

        let mut file = self.fetch_record(&location).await?;
        file.verify_signature()?;
        let content_key = self.unwrap_read_key(&file, &username, &exchange_key)?;
        let write_key = self.unwrap_write_key(&file, &username, &exchange_key)?;

        let mut content = file.open_content(&content_key)?;
        content.extend_from_slice(extra);

        file.reseal(&content, &content_key, &write_key)?;
        let blob = file.encode()?;
        self.stores.data().put(*location, Bytes::from(blob)).await?;

        tracing::debug!(filename, %location, added = extra.len(), "appended to file");
        Ok(())
    }

    // ---- shared helpers, also used by sharing.rs ----

    /// Username, exchange key, and recorded location for `filename`.
    pub(crate) fn file_context(
        &self,
        filename: &str,
    ) -> Result<(String, SecretKey, RecordId), VaultError> {
        let record = self.inner.lock();
        let location = record
            .files
            .get(filename)
            .copied()
            .ok_or_else(|| VaultError::NotFound(format!("no such file: {filename}")))?;
        Ok((record.username.clone(), record.exchange_key.clone(), location))
    }

    /// Fetch and structurally decode the file record at `location`.
    pub(crate) async fn fetch_record(&self, location: &RecordId) -> Result<FileRecord, VaultError> {
        let blob = self
            .stores
            .data()
            .get(location)
            .await?
            .ok_or_else(|| VaultError::NotFound(format!("no record at {location}")))?;
        FileRecord::decode(&blob)
    }

    /// Unwrap the caller's copy of the content key from the bundle, or fail
    /// with [`VaultError::AccessRevoked`] if the caller is not a reader.
    /// An entry that fails its authenticated unwrap reports as
    /// [`VaultError::Tampered`].
    pub(crate) fn unwrap_read_key(
        &self,
        file: &FileRecord,
        username: &str,
        exchange_key: &SecretKey,
    ) -> Result<ContentKey, VaultError> {
        let wrap = file
            .bundle()
            .reader(username)
            .ok_or_else(|| VaultError::AccessRevoked(username.to_string()))?;
        wrap.unwrap_key(exchange_key)
            .map_err(|_| VaultError::Tampered(format!("wrapped read key for {username}")))
    }

    /// Unwrap the caller's copy of the write key from the bundle, or fail
    /// with [`VaultError::AccessRevoked`] if the caller is not a writer.
    /// An entry that fails its authenticated unwrap reports as
    /// [`VaultError::Tampered`].
    pub(crate) fn unwrap_write_key(
        &self,
        file: &FileRecord,
        username: &str,
        exchange_key: &SecretKey,
    ) -> Result<SecretKey, VaultError> {
        let wrap = file
            .bundle()
            .writer(username)
            .ok_or_else(|| VaultError::AccessRevoked(username.to_string()))?;
        let seed = wrap
            .unwrap_bytes(exchange_key)
            .map_err(|_| VaultError::Tampered(format!("wrapped write key for {username}")))?;
        Ok(SecretKey::from(seed))
    }
}
