//! Error types for the store layer.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A primary key or unique index already holds this value.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Underlying database error.
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    /// Record (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The collection is not declared in the schema.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// The index is not declared on the collection.
    #[error("unknown index {index} on collection {collection}")]
    UnknownIndex { collection: String, index: String },

    /// A record is missing the field its collection uses as primary key.
    #[error("record has no key field {field} for collection {collection}")]
    MissingKeyField { collection: String, field: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(
                    msg.clone().unwrap_or_else(|| "duplicate key".to_string()),
                )
            }
            _ => StoreError::Database(err),
        }
    }
}
