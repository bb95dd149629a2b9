//! Datastore trait and in-memory implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::Result;
use crate::BlobId;

/// A flat key-value blob store with last-write-wins semantics.
///
/// The datastore provides no authenticity or confidentiality. Callers must
/// treat every returned blob as potentially tampered.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Store `bytes` at `id`, replacing any prior value.
    async fn put(&self, id: BlobId, bytes: Bytes) -> Result<()>;

    /// Fetch the blob at `id`, or `None` if nothing is stored there.
    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>>;
}

/// In-memory datastore backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    inner: Arc<Mutex<HashMap<BlobId, Bytes>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// All identifiers currently stored. Test hook for enumerating state.
    pub fn ids(&self) -> Vec<BlobId> {
        self.inner.lock().keys().copied().collect()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn put(&self, id: BlobId, bytes: Bytes) -> Result<()> {
        tracing::trace!(id = %hex::encode(id), len = bytes.len(), "datastore put");
        self.inner.lock().insert(id, bytes);
        Ok(())
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>> {
        Ok(self.inner.lock().get(id).cloned())
    }
}

/// A fault-injecting wrapper around a [`Datastore`].
///
/// Simulates the passively-adversarial store: served blobs can have a single
/// byte flipped, or be withheld entirely. Faults apply on `get`; the
/// underlying stored bytes are left intact so faults can be toggled off again.
#[derive(Clone)]
pub struct ChaosDatastore<D> {
    inner: D,
    state: Arc<Mutex<ChaosState>>,
}

#[derive(Debug, Default)]
struct ChaosState {
    /// Flip the byte at this offset of every served blob.
    corrupt_at: Option<usize>,
    /// Pretend these ids do not exist.
    withheld: Vec<BlobId>,
}

impl<D: Datastore> ChaosDatastore<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(ChaosState::default())),
        }
    }

    /// Flip one byte at `offset` (modulo blob length) of every served blob.
    pub fn corrupt_at(&self, offset: usize) {
        self.state.lock().corrupt_at = Some(offset);
    }

    /// Stop corrupting served blobs.
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.corrupt_at = None;
        state.withheld.clear();
    }

    /// Withhold the blob at `id`, as if the store had deleted it.
    pub fn withhold(&self, id: BlobId) {
        self.state.lock().withheld.push(id);
    }
}

#[async_trait]
impl<D: Datastore> Datastore for ChaosDatastore<D> {
    async fn put(&self, id: BlobId, bytes: Bytes) -> Result<()> {
        self.inner.put(id, bytes).await
    }

    async fn get(&self, id: &BlobId) -> Result<Option<Bytes>> {
        let (corrupt_at, withheld) = {
            let state = self.state.lock();
            (state.corrupt_at, state.withheld.contains(id))
        };
        if withheld {
            return Ok(None);
        }
        let blob = self.inner.get(id).await?;
        Ok(blob.map(|bytes| match corrupt_at {
            Some(offset) if !bytes.is_empty() => {
                let mut buf = bytes.to_vec();
                let at = offset % buf.len();
                buf[at] ^= 0xff;
                Bytes::from(buf)
            }
            _ => bytes,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get() {
        let store = MemoryDatastore::new();
        let id = [7u8; 32];

        assert!(store.get(&id).await.unwrap().is_none());

        store.put(id, Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().as_ref(), b"hello");

        // last write wins
        store.put(id, Bytes::from_static(b"world")).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().unwrap().as_ref(), b"world");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_chaos_corrupt_and_heal() {
        let store = ChaosDatastore::new(MemoryDatastore::new());
        let id = [1u8; 32];
        store.put(id, Bytes::from_static(b"payload")).await.unwrap();

        store.corrupt_at(2);
        let served = store.get(&id).await.unwrap().unwrap();
        assert_ne!(served.as_ref(), b"payload");
        assert_eq!(served.len(), 7);

        store.heal();
        let served = store.get(&id).await.unwrap().unwrap();
        assert_eq!(served.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_chaos_withhold() {
        let store = ChaosDatastore::new(MemoryDatastore::new());
        let id = [2u8; 32];
        store.put(id, Bytes::from_static(b"gone")).await.unwrap();

        store.withhold(id);
        assert!(store.get(&id).await.unwrap().is_none());

        store.heal();
        assert!(store.get(&id).await.unwrap().is_some());
    }
}
