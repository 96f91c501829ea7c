/// Errors from listing store operations.
///
/// Every variant is an infrastructure fault. A missing listing is never an
/// error at this layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A lock guarding the table was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    LockPoisoned(String),

    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
