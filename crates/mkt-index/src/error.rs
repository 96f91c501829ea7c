use mkt_store::StoreError;
use mkt_types::TypeError;

/// Errors produced by event decoding, reduction, and queries.
///
/// A missing listing is never an error here: the reducer reports it as
/// [`Applied::Ignored`](crate::Applied::Ignored) and queries return `None`.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("malformed event: {field}: {reason}")]
    MalformedEvent { field: String, reason: String },

    #[error("malformed event on line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("invalid listing key: {0}")]
    InvalidKey(#[from] TypeError),

    #[error("invalid filter: {field}: {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IndexError {
    pub(crate) fn malformed(field: &str, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// `true` for rejections of bad input, as opposed to infrastructure faults.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedEvent { .. }
                | Self::MalformedLine { .. }
                | Self::InvalidKey(_)
                | Self::InvalidFilter { .. }
        )
    }
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
