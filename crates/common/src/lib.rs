/**
 * Cryptographic types and operations.
 *  - Public and secret key implementations
 *  - Password-derived master secrets
 *  - Key-to-key key wrapping
 */
pub mod crypto;
/**
 * Sealed record codec.
 * Authenticated-encryption envelope used for every
 *  object persisted to the datastore, plus the
 *  validated multi-part framing that lets content
 *  and key bundle share one storage slot.
 */
pub mod sealed;
/**
 * The vault: user records, file records, key
 *  bundles, and the session operations over them
 *  (store / load / append / share / receive /
 *  revoke).
 */
pub mod vault;

pub mod prelude {
    pub use crate::crypto::{PublicKey, SecretKey};
    pub use crate::vault::{RecordId, Session, Stores, VaultError};
    pub use store::{Datastore, Keystore, MemoryDatastore, MemoryKeystore};
}
