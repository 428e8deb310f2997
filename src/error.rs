//! Error types for the whatsapp-history-rust library.
//!
//! Two layers live here. [`TransformError`] covers the row-scoped failures of the
//! transformation core: a row that raises one is skipped by the pipeline and never
//! retried. [`HistoryError`] covers everything around the core (database access,
//! files, the dedupe store, configuration).

use thiserror::Error;

/// Row-scoped failures raised while turning one raw row into a record graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The sender of the message could not be determined
    #[error("Could not determine message actor: {0}")]
    UnresolvableActor(String),

    /// A roster entry needed to build an identity is missing its member id
    #[error("Could not build identity: {0}")]
    UnresolvableContact(String),

    /// The row timestamp could not be parsed
    #[error("Unparseable timestamp: {0:?}")]
    UnparseableTimestamp(String),

    /// A qualifying attachment could not be encoded
    #[error("Could not encode attachment {path}: {reason}")]
    AttachmentEncoding {
        /// Attachment file that failed to encode
        path: String,
        /// Underlying encoder failure
        reason: String,
    },
}

impl TransformError {
    /// Short label used for logging fields and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnresolvableActor(_) => "unresolvable_actor",
            Self::UnresolvableContact(_) => "unresolvable_contact",
            Self::UnparseableTimestamp(_) => "unparseable_timestamp",
            Self::AttachmentEncoding { .. } => "attachment_encoding",
        }
    }
}

/// Errors that can occur in the whatsapp-history-rust application.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The WhatsApp database file could not be found or opened
    #[error("WhatsApp database error: {0}")]
    WhatsAppDatabase(String),

    /// A row could not be transformed
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV output errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Binary serialization errors
    #[error("Binary serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Dedupe store errors
    #[error("Store error: {0}")]
    Store(String),

    /// General error with context
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Result with HistoryError
pub type Result<T> = std::result::Result<T, HistoryError>;

impl From<anyhow::Error> for HistoryError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<sled::Error> for HistoryError {
    fn from(err: sled::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<tokio::task::JoinError> for HistoryError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Other(format!("Background task failed: {err}"))
    }
}
