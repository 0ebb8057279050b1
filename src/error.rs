/// Unified error types for the ripplefeed content-distribution core
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Cache errors
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Serialization errors (cached values, event payloads)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not found errors
    #[error("not found: {0}")]
    NotFound(String),

    /// The (article, author) pair does not match any row. Distinct from a
    /// generic store failure so callers can report it as a user error.
    #[error("article {article_id} does not belong to author {author_id}")]
    OwnershipMismatch { article_id: i64, author_id: i64 },

    /// A feed event payload is missing a required extension field
    #[error("missing event field: {0}")]
    MissingField(String),

    /// A feed event payload field exists but cannot be parsed
    #[error("malformed event field {field}: {value}")]
    MalformedField { field: String, value: String },

    /// Configuration errors
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
