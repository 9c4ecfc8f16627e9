use crate::data::id::Identifier;

/// Errors raised by the document store boundary. Backends may carry richer
/// errors internally, but what crosses into the identity stores is one of
/// these.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A first-match query found nothing.
    #[error("sequence contains no matching element")]
    NoMatchingDocument,

    /// A staged update targeted a document that is not stored.
    #[error("document {id} does not exist in {collection}")]
    DocumentNotFound {
        collection: &'static str,
        id: Identifier,
    },

    #[error("duplicate key value violates unique index {index}: {value}")]
    UniqueViolation {
        index: &'static str,
        value: String,
    },

    /// Update and delete need an id the store assigned earlier.
    #[error("document in {collection} has no identifier")]
    MissingIdentifier { collection: &'static str },

    #[error("session has been disposed")]
    SessionDisposed,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Dedicated to connection errors of remote backends, unexpected and could crash
    #[error("connection error: {0}")]
    ConnectionReset(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Stable machine-readable code, used when a failure is reported back as a result.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NoMatchingDocument => "NoMatchingDocument",
            StoreError::DocumentNotFound { .. } => "DocumentNotFound",
            StoreError::UniqueViolation { .. } => "UniqueViolation",
            StoreError::MissingIdentifier { .. } => "MissingIdentifier",
            StoreError::SessionDisposed => "SessionDisposed",
            StoreError::Cancelled => "Cancelled",
            StoreError::Serialization(_) => "Serialization",
            StoreError::ConnectionReset(_) => "ConnectionReset",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NoMatchingDocument | StoreError::DocumentNotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
