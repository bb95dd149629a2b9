//! Trust-nothing storage seam for Coffer
//!
//! This crate defines the two external services the protocol is layered on:
//!
//! - [`Datastore`]: a flat key-value blob store addressed by opaque 32-byte
//!   identifiers. Last-write-wins, no authenticity, no confidentiality. The
//!   store may return tampered bytes or nothing at all; every caller must
//!   authenticate what it reads.
//! - [`Keystore`]: a public-key directory mapping names to opaque key bytes.
//!   Registration is first-write-wins: a taken name can never be re-bound.
//!
//! Both traits are object-safe and injected into the protocol core, never
//! reached through globals, so tests can substitute the in-memory fakes
//! ([`MemoryDatastore`], [`MemoryKeystore`]) or the fault-injecting
//! [`ChaosDatastore`] wrapper.

mod datastore;
mod error;
mod keystore;

pub use datastore::{ChaosDatastore, Datastore, MemoryDatastore};
pub use error::{Result, StoreError};
pub use keystore::{Keystore, MemoryKeystore};

/// Width of a datastore identifier in bytes.
pub const ID_SIZE: usize = 32;

/// An opaque fixed-width datastore identifier.
pub type BlobId = [u8; ID_SIZE];
