//! Keystore trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Result, StoreError};

/// A public-key directory mapping names to opaque key bytes.
///
/// The keystore itself guarantees nothing about the keys it serves; callers
/// parse and validate on lookup. Registration is first-write-wins, which is
/// the only property the protocol relies on: a name, once bound, can never be
/// silently re-bound to an attacker's key.
#[async_trait]
pub trait Keystore: Send + Sync {
    /// Bind `name` to `key`. Fails with [`StoreError::NameTaken`] if the name
    /// is already bound.
    async fn register(&self, name: &str, key: Bytes) -> Result<()>;

    /// Look up the key bound to `name`, or `None` if unbound.
    async fn lookup(&self, name: &str) -> Result<Option<Bytes>>;
}

/// In-memory keystore backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeystore {
    inner: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[async_trait]
impl Keystore for MemoryKeystore {
    async fn register(&self, name: &str, key: Bytes) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.contains_key(name) {
            return Err(StoreError::NameTaken(name.to_string()));
        }
        tracing::trace!(name, "keystore register");
        inner.insert(name.to_string(), key);
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<Option<Bytes>> {
        Ok(self.inner.lock().get(name).cloned())
    }
}
