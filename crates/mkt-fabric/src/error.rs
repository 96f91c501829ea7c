use std::io;

use mkt_index::IndexError;

/// Errors produced by the ingestion fabric.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// I/O error during WAL or file operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Decoding or reducing an event failed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// A lock guarding fabric state was poisoned.
    #[error("fabric lock poisoned: {0}")]
    LockPoisoned(String),
}

impl FabricError {
    /// `true` when the event itself was bad; retrying it cannot succeed.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Index(e) if e.is_malformed())
    }
}

/// Convenience alias used throughout the fabric crate.
pub type Result<T> = std::result::Result<T, FabricError>;
