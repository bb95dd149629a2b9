//! Shared test utilities for vault integration tests
#![allow(dead_code)]

use std::sync::Arc;

use common::crypto::KdfParams;
use common::vault::{Session, Stores};
use store::{ChaosDatastore, MemoryDatastore, MemoryKeystore};

/// KDF parameters tuned for test speed, not security.
pub fn kdf() -> KdfParams {
    KdfParams::insecure_fast()
}

/// Install a tracing subscriber honoring `RUST_LOG`. Safe to call from every
/// test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Fresh in-memory stores.
pub fn setup_stores() -> Stores {
    init_tracing();
    Stores::new(
        Arc::new(MemoryDatastore::new()),
        Arc::new(MemoryKeystore::new()),
    )
}

/// Stores whose datastore can corrupt or withhold blobs on demand.
///
/// Returns the chaos handle separately so tests can toggle faults while the
/// sessions keep talking to the same store.
pub fn setup_chaos_stores() -> (Stores, ChaosDatastore<MemoryDatastore>) {
    init_tracing();
    let chaos = ChaosDatastore::new(MemoryDatastore::new());
    let stores = Stores::new(Arc::new(chaos.clone()), Arc::new(MemoryKeystore::new()));
    (stores, chaos)
}

/// Register `username` with a derived password and return the session.
pub async fn register(stores: &Stores, username: &str) -> Session {
    Session::register_with(stores, username, &password_for(username), &kdf())
        .await
        .unwrap()
}

/// Log `username` back in with the same derived password.
pub async fn login(stores: &Stores, username: &str) -> Session {
    Session::login_with(stores, username, &password_for(username), &kdf())
        .await
        .unwrap()
}

pub fn password_for(username: &str) -> String {
    format!("{username}-hunter2")
}
