//! Password-bound key derivation
//!
//! The user record is both located and unlocked by secrets derived from
//! (username, password), so a login needs no stored index at all:
//!
//! ```text
//! Master Secret (256-bit, Argon2id over password with salt = BLAKE3(username))
//!   ├── Record Key      (HKDF-SHA256, domain "coffer/user-record/v1")
//!   └── Record Location (BLAKE3 keyed hash, domain "coffer/user-location/v1")
//! ```
//!
//! Different passwords for the same username derive different locations, so a
//! failed guess observes nothing at the true location.

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use super::content_key::{ContentKey, KEY_SIZE};

/// Argon2id salt width in bytes
const SALT_SIZE: usize = 16;

/// Domain label for the user-record sealing key.
const RECORD_KEY_CONTEXT: &[u8] = b"coffer/user-record/v1";
/// Domain label for the user-record storage location.
const RECORD_LOCATION_CONTEXT: &str = "coffer/user-location/v1";

/// A 256-bit master secret derived from a username and password via Argon2id.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Derive the sealing key for the user record via HKDF-SHA256.
    pub fn record_key(&self) -> ContentKey {
        let hkdf = Hkdf::<Sha256>::new(None, &self.bytes);
        let mut okm = [0u8; KEY_SIZE];
        hkdf.expand(RECORD_KEY_CONTEXT, &mut okm)
            .expect("32 bytes is a valid HKDF-SHA256 output length");
        ContentKey::from(okm)
    }

    /// Derive the deterministic storage location of the user record.
    ///
    /// A BLAKE3 keyed hash of the domain label under the master secret; the
    /// full 32-byte digest is the identifier.
    pub fn record_location(&self) -> [u8; KEY_SIZE] {
        *blake3::Hasher::new_keyed(&self.bytes)
            .update(RECORD_LOCATION_CONTEXT.as_bytes())
            .finalize()
            .as_bytes()
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters for the password KDF
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Not for production use.
    pub fn insecure_fast() -> Self {
        Self {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Derive the 256-bit master secret for a user from their password.
///
/// The salt is the first 16 bytes of BLAKE3(username): deterministic per
/// username (relocating the record requires nothing but the credentials) and
/// valid for any username length, where the raw username would fall under
/// Argon2's minimum salt size.
pub fn derive_master_key(
    username: &str,
    password: &str,
    params: &KdfParams,
) -> anyhow::Result<MasterKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| anyhow::anyhow!("invalid Argon2id params: {e}"))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&blake3::hash(username.as_bytes()).as_bytes()[..SALT_SIZE]);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), &salt, &mut key)
        .map_err(|e| anyhow::anyhow!("Argon2id KDF failed: {e}"))?;

    Ok(MasterKey::from_bytes(key))
}
