//! Cryptographic primitives for Coffer
//!
//! This module provides the cryptographic foundation for Coffer's security model:
//!
//! - **Identity & Authentication**: Ed25519 keypairs for user identity (one
//!   exchange keypair, one signing keypair per user)
//! - **Password Derivation**: Argon2id from (password, username) to a master
//!   secret that locates and unlocks the user record
//! - **Encryption**: ChaCha20-Poly1305 content keys, one per file
//! - **Key Wrapping**: ECDH-based per-recipient wrapping using X25519 curve
//!   conversion plus AES-KW
//!
//! # Security Model
//!
//! ## User Identity
//! Each user has two Ed25519 keypairs generated at registration and never
//! rotated: an exchange keypair (published as `<username>.pk`) used for key
//! wrapping, and a signing keypair (published as `<username>.vk`) used for
//! write authorization. The private halves live only inside the sealed user
//! record and the in-memory session.
//!
//! ## Content Encryption
//! Every file has its own symmetric [`ContentKey`]. Rotating a file's key
//! (on revocation) never requires touching other files.
//!
//! ## Key Wrapping Protocol
//! To hand a 32-byte secret to another user:
//! 1. Generate an ephemeral Ed25519 keypair
//! 2. Convert both keys to X25519 (Montgomery curve)
//! 3. Perform ECDH to derive a shared secret
//! 4. Use AES-KW to wrap the secret under the shared secret
//! 5. Package as a [`WrappedKey`] (ephemeral_pubkey || wrapped_secret)
//!
//! The recipient reverses the ECDH with their private key and unwraps.

mod content_key;
mod kdf;
mod keys;
mod wrap;

pub use ed25519_dalek::Signature;
pub use content_key::{ContentKey, ContentKeyError, KEY_SIZE};
pub use kdf::{derive_master_key, KdfParams, MasterKey};
pub use keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};
pub use wrap::{WrapError, WrappedKey, WRAPPED_KEY_SIZE};
