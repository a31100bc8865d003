//! Error types for the knowledge base.
//!
//! Remote provider failures are deliberately not a variant here: wherever
//! local state can stay authoritative they are absorbed into sync-state
//! transitions, never surfaced to callers. Local persistence failures
//! always surface.

/// Errors that can occur in knowledge-base operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No record with the given id.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The requester lacks the capability for this operation.
    #[error("permission denied")]
    PermissionDenied,

    /// A caller-supplied value failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// SQLite persistence error (always surfaced, never swallowed).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization / deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error (seeding, paths, settings).
    #[error("configuration error: {0}")]
    Config(String),

    /// General internal error.
    #[error("{0}")]
    Internal(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
