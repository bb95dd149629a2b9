//! On-store file record layout
//!
//! A file occupies exactly one storage slot for its whole life. The stored
//! blob is a three-part frame:
//!
//! ```text
//! frame v1 [
//!   part 0: sealed content            (AEAD under the file's content key)
//!   part 1: key bundle                (bincode; per-entry authenticated wraps)
//!   part 2: write signature, 64 bytes (Ed25519 over parts 0+1 by the write key)
//! ]
//! ```
//!
//! The signature covers the sealed content and the encoded bundle together:
//! a holder of only the read key can decrypt, but cannot produce a rewrite
//! or a bundle edit that verifies against the bundle's verify key, and any
//! flipped byte of either part fails verification before anything is
//! decrypted or unwrapped.

use ed25519_dalek::Signature;

use crate::crypto::{ContentKey, PublicKey, SecretKey};
use crate::sealed::{self, frame};

use super::bundle::KeyBundle;
use super::VaultError;

/// Width of an Ed25519 signature in bytes.
const SIGNATURE_SIZE: usize = 64;

/// A decoded file record: sealed content, its key bundle, and the write
/// signature over both.
#[derive(Debug, Clone)]
pub struct FileRecord {
    sealed_content: Vec<u8>,
    bundle: KeyBundle,
    signature: Signature,
}

impl FileRecord {
    /// Seal `content` under `content_key`, sign it with `write_key`, and
    /// assemble a record carrying `bundle`.
    pub fn seal(
        content: &[u8],
        content_key: &ContentKey,
        write_key: &SecretKey,
        bundle: KeyBundle,
    ) -> Result<Self, VaultError> {
        let sealed_content = sealed::seal(content_key, content)?;
        let signature = write_key.sign(&signing_bytes(&sealed_content, &bundle)?);
        Ok(FileRecord {
            sealed_content,
            bundle,
            signature,
        })
    }

    /// Encode the record into its framed storage blob.
    pub fn encode(&self) -> Result<Vec<u8>, VaultError> {
        let bundle_bytes = bincode::serialize(&self.bundle)?;
        let sig_bytes = self.signature.to_bytes();
        Ok(frame::encode(&[
            &self.sealed_content,
            &bundle_bytes,
            &sig_bytes,
        ])?)
    }

    /// Decode a storage blob into a record.
    ///
    /// Structural validation only; authentication happens in
    /// [`verify`](Self::verify_signature) and when opening the sealed content.
    pub fn decode(blob: &[u8]) -> Result<Self, VaultError> {
        let parts = frame::decode_exact(blob, 3)?;
        let sealed_content = parts[0].to_vec();
        let bundle: KeyBundle = bincode::deserialize(parts[1])?;
        let sig_bytes: [u8; SIGNATURE_SIZE] = parts[2]
            .try_into()
            .map_err(|_| VaultError::Malformed(format!("signature part: {} bytes", parts[2].len())))?;
        let signature = Signature::from_bytes(&sig_bytes);
        Ok(FileRecord {
            sealed_content,
            bundle,
            signature,
        })
    }

    /// Check the write signature over the sealed content and bundle against
    /// the bundle's verify key.
    ///
    /// Call this on every record fetched from the datastore before touching
    /// its keys or content.
    pub fn verify_signature(&self) -> Result<(), VaultError> {
        let message = signing_bytes(&self.sealed_content, &self.bundle)?;
        self.bundle
            .verify_key()
            .verify(&message, &self.signature)
            .map_err(|_| VaultError::Tampered("write signature".to_string()))
    }

    /// Open the sealed content with an unwrapped content key.
    pub fn open_content(&self, content_key: &ContentKey) -> Result<Vec<u8>, VaultError> {
        Ok(sealed::open(content_key, &self.sealed_content)?)
    }

    /// Re-seal new content in place, keeping the bundle, under a possibly
    /// rotated key pair.
    pub fn reseal(
        &mut self,
        content: &[u8],
        content_key: &ContentKey,
        write_key: &SecretKey,
    ) -> Result<(), VaultError> {
        self.sealed_content = sealed::seal(content_key, content)?;
        self.resign(write_key)
    }

    /// Sign the record's current state with `write_key`. Must follow any
    /// bundle mutation before the record goes back to the store.
    pub fn resign(&mut self, write_key: &SecretKey) -> Result<(), VaultError> {
        self.signature = write_key.sign(&signing_bytes(&self.sealed_content, &self.bundle)?);
        Ok(())
    }

    pub fn bundle(&self) -> &KeyBundle {
        &self.bundle
    }

    pub fn bundle_mut(&mut self) -> &mut KeyBundle {
        &mut self.bundle
    }

    /// The verify key the record currently carries; exposed for tests.
    pub fn verify_key(&self) -> &PublicKey {
        self.bundle.verify_key()
    }
}

/// The byte string the write signature covers: sealed content followed by
/// the bincode-encoded bundle. The bundle's maps are ordered, so encoding
/// the same bundle always reproduces the same bytes.
fn signing_bytes(sealed_content: &[u8], bundle: &KeyBundle) -> Result<Vec<u8>, VaultError> {
    let bundle_bytes = bincode::serialize(bundle)?;
    let mut message = Vec::with_capacity(sealed_content.len() + bundle_bytes.len());
    message.extend_from_slice(sealed_content);
    message.extend_from_slice(&bundle_bytes);
    Ok(message)
}

#[cfg(test)]
mod test {
    use super::*;

    fn owner_record(content: &[u8]) -> (FileRecord, SecretKey, ContentKey, SecretKey) {
        let owner = SecretKey::generate();
        let content_key = ContentKey::generate();
        let write_key = SecretKey::generate();
        let bundle =
            KeyBundle::new("alice", &owner.public(), &content_key, &write_key).unwrap();
        let record = FileRecord::seal(content, &content_key, &write_key, bundle).unwrap();
        (record, owner, content_key, write_key)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let (record, _, content_key, _) = owner_record(b"file body");

        let blob = record.encode().unwrap();
        let decoded = FileRecord::decode(&blob).unwrap();

        decoded.verify_signature().unwrap();
        assert_eq!(decoded.open_content(&content_key).unwrap(), b"file body");
        assert_eq!(decoded.bundle(), record.bundle());
    }

    #[test]
    fn test_signature_rejects_content_swap() {
        let (record, _, content_key, _) = owner_record(b"original");

        // an adversary re-seals different bytes under the same content key
        // but cannot sign without the write key
        let mut forged = record.clone();
        forged.sealed_content = sealed::seal(&content_key, b"forged").unwrap();
        assert!(matches!(
            forged.verify_signature().unwrap_err(),
            VaultError::Tampered(_)
        ));
    }

    #[test]
    fn test_bundle_mutation_invalidates_signature() {
        let (mut record, _, _, write_key) = owner_record(b"body");

        let mallory = SecretKey::generate();
        let content_key = ContentKey::generate();
        let grant_write = SecretKey::generate();
        record
            .bundle_mut()
            .grant("mallory", &mallory.public(), &content_key, &grant_write)
            .unwrap();

        assert!(matches!(
            record.verify_signature().unwrap_err(),
            VaultError::Tampered(_)
        ));

        record.resign(&write_key).unwrap();
        record.verify_signature().unwrap();
    }

    #[test]
    fn test_reseal_updates_signature() {
        let (mut record, _, content_key, write_key) = owner_record(b"v1");
        record.reseal(b"v2", &content_key, &write_key).unwrap();
        record.verify_signature().unwrap();
        assert_eq!(record.open_content(&content_key).unwrap(), b"v2");
    }

    #[test]
    fn test_decode_rejects_wrong_part_count() {
        let blob = frame::encode(&[b"only".as_slice(), b"two".as_slice()]).unwrap();
        assert!(matches!(
            FileRecord::decode(&blob).unwrap_err(),
            VaultError::Malformed(_)
        ));
    }

    #[test]
    fn test_decode_rejects_bad_signature_width() {
        let (record, _, _, _) = owner_record(b"x");
        let bundle_bytes = bincode::serialize(record.bundle()).unwrap();
        let blob = frame::encode(&[
            record.sealed_content.as_slice(),
            &bundle_bytes,
            b"not a signature",
        ])
        .unwrap();
        assert!(matches!(
            FileRecord::decode(&blob).unwrap_err(),
            VaultError::Malformed(_)
        ));
    }
}
