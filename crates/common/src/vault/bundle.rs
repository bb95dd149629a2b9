//! # Key bundles
//!
//! A [`KeyBundle`] is the per-file access-control structure, persisted in the
//! same storage slot as the sealed content it governs. It maps each
//! authorized username to that user's personal wrapped copies of the file's
//! current keys:
//!
//! - `readers`: username → wrapped content key (decrypts the sealed content)
//! - `writers`: username → wrapped write-key seed (signs content rewrites)
//!
//! plus the file's current write-verify key, against which the record's
//! write signature is checked. That signature covers the bundle itself, so
//! any mutation here must be followed by re-signing with the write key.
//!
//! ## Invariant
//!
//! A username appears in the bundle if and only if that user currently has
//! access. Removing an entry alone does not revoke anything — the removed
//! user still holds the old key material — so revocation pairs removal with
//! rotating both keys and re-wrapping them for everyone who remains.
//!
//! The bundle structure itself is stored in plaintext but covered by the
//! record's write signature; each entry is additionally authenticated
//! encryption (AES-KW under an ECDH-derived key), and the bundle cannot be
//! sealed under a single symmetric key without breaking access
//! bootstrapping for new recipients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crypto::{ContentKey, PublicKey, SecretKey, WrapError, WrappedKey};

/// Map of usernames to their wrapped key copies.
pub type Entries = BTreeMap<String, WrappedKey>;

/// Per-file access control: who can read, who can write, and under which
/// verify key writes are checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBundle {
    /// username → wrapped copy of the current content key
    readers: Entries,
    /// username → wrapped copy of the current write-key seed
    writers: Entries,
    /// Public half of the current write keypair.
    verify: PublicKey,
}

impl KeyBundle {
    /// Create a bundle containing only the owner, with both keys wrapped
    /// under the owner's exchange public key.
    pub fn new(
        owner: &str,
        owner_exchange: &PublicKey,
        content_key: &ContentKey,
        write_key: &SecretKey,
    ) -> Result<Self, WrapError> {
        let mut bundle = KeyBundle {
            readers: BTreeMap::new(),
            writers: BTreeMap::new(),
            verify: write_key.public(),
        };
        bundle.grant(owner, owner_exchange, content_key, write_key)?;
        Ok(bundle)
    }

    /// Wrap fresh copies of both current keys for `username` and insert them
    /// into both maps.
    pub fn grant(
        &mut self,
        username: &str,
        exchange: &PublicKey,
        content_key: &ContentKey,
        write_key: &SecretKey,
    ) -> Result<(), WrapError> {
        let read_wrap = WrappedKey::wrap(content_key, exchange)?;
        let write_wrap = WrappedKey::wrap_bytes(&write_key.to_bytes(), exchange)?;
        self.readers.insert(username.to_string(), read_wrap);
        self.writers.insert(username.to_string(), write_wrap);
        Ok(())
    }

    /// Replace `username`'s reader entry. Used during rekey, where readers
    /// and writers get fresh wraps independently.
    pub(crate) fn insert_reader(&mut self, username: &str, wrap: WrappedKey) {
        self.readers.insert(username.to_string(), wrap);
    }

    /// Replace `username`'s writer entry.
    pub(crate) fn insert_writer(&mut self, username: &str, wrap: WrappedKey) {
        self.writers.insert(username.to_string(), wrap);
    }

    /// Remove `username` from both maps. Returns true if the user was
    /// present in either.
    ///
    /// This alone never revokes access; the caller must rotate keys after.
    pub fn remove(&mut self, username: &str) -> bool {
        let read = self.readers.remove(username).is_some();
        let write = self.writers.remove(username).is_some();
        read || write
    }

    /// The wrapped content key for `username`, if authorized to read.
    pub fn reader(&self, username: &str) -> Option<&WrappedKey> {
        self.readers.get(username)
    }

    /// The wrapped write seed for `username`, if authorized to write.
    pub fn writer(&self, username: &str) -> Option<&WrappedKey> {
        self.writers.get(username)
    }

    /// Usernames currently authorized to read.
    pub fn reader_names(&self) -> impl Iterator<Item = &str> {
        self.readers.keys().map(String::as_str)
    }

    /// Usernames currently authorized to write.
    pub fn writer_names(&self) -> impl Iterator<Item = &str> {
        self.writers.keys().map(String::as_str)
    }

    /// The verify key for the file's current write keypair.
    pub fn verify_key(&self) -> &PublicKey {
        &self.verify
    }

    /// Replace the verify key. Called only when the write keypair rotates.
    pub fn set_verify_key(&mut self, verify: PublicKey) {
        self.verify = verify;
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_bundle(owner: &str, owner_key: &SecretKey) -> (KeyBundle, ContentKey, SecretKey) {
        let content_key = ContentKey::generate();
        let write_key = SecretKey::generate();
        let bundle =
            KeyBundle::new(owner, &owner_key.public(), &content_key, &write_key).unwrap();
        (bundle, content_key, write_key)
    }

    #[test]
    fn test_new_bundle_contains_only_owner() {
        let alice = SecretKey::generate();
        let (bundle, _, write_key) = new_bundle("alice", &alice);

        assert_eq!(bundle.len(), 1);
        assert!(bundle.reader("alice").is_some());
        assert!(bundle.writer("alice").is_some());
        assert!(bundle.reader("bob").is_none());
        assert_eq!(bundle.verify_key(), &write_key.public());
    }

    #[test]
    fn test_owner_recovers_both_keys() {
        let alice = SecretKey::generate();
        let (bundle, content_key, write_key) = new_bundle("alice", &alice);

        let recovered = bundle.reader("alice").unwrap().unwrap_key(&alice).unwrap();
        assert_eq!(recovered, content_key);

        let seed = bundle.writer("alice").unwrap().unwrap_bytes(&alice).unwrap();
        assert_eq!(seed, write_key.to_bytes());
    }

    #[test]
    fn test_grant_and_remove() {
        let alice = SecretKey::generate();
        let bob = SecretKey::generate();
        let (mut bundle, content_key, write_key) = new_bundle("alice", &alice);

        bundle
            .grant("bob", &bob.public(), &content_key, &write_key)
            .unwrap();
        assert_eq!(bundle.len(), 2);

        // bob's copy opens with bob's key only
        let bob_wrap = bundle.reader("bob").unwrap();
        assert_eq!(bob_wrap.unwrap_key(&bob).unwrap(), content_key);
        assert!(bob_wrap.unwrap_key(&alice).is_err());

        assert!(bundle.remove("bob"));
        assert!(bundle.reader("bob").is_none());
        assert!(bundle.writer("bob").is_none());
        assert!(!bundle.remove("bob"));
    }

    #[test]
    fn test_grant_fills_both_maps_distinctly() {
        // the write wrap must land in the writer map, not overwrite the
        // reader entry
        let alice = SecretKey::generate();
        let (bundle, content_key, write_key) = new_bundle("alice", &alice);

        let read = bundle.reader("alice").unwrap().unwrap_bytes(&alice).unwrap();
        let write = bundle.writer("alice").unwrap().unwrap_bytes(&alice).unwrap();
        assert_eq!(read, *content_key);
        assert_eq!(write, write_key.to_bytes());
        assert_ne!(read, write);
    }

    #[test]
    fn test_serde_roundtrip() {
        let alice = SecretKey::generate();
        let (bundle, content_key, _) = new_bundle("alice", &alice);

        let bytes = bincode::serialize(&bundle).unwrap();
        let decoded: KeyBundle = bincode::deserialize(&bytes).unwrap();
        assert_eq!(bundle, decoded);

        let recovered = decoded.reader("alice").unwrap().unwrap_key(&alice).unwrap();
        assert_eq!(recovered, content_key);
    }
}
