//! Error types for the storage seam.

/// Errors that can occur when talking to the datastore or keystore.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Keystore registration collision: the name is already bound.
    #[error("keystore name already taken: {0}")]
    NameTaken(String),

    /// The backing service rejected or failed the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
