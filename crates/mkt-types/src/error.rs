use thiserror::Error;

/// Errors produced by type parsing and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid integer {input:?}: {reason}")]
    InvalidInteger { input: String, reason: String },

    #[error("invalid listing key {input:?}: {reason}")]
    InvalidKey { input: String, reason: String },
}
