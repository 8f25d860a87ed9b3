//! Error types for the sync layer.

use fieldcite_store::StoreError;
use fieldcite_types::EntityKind;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network/transport error.
    #[error("network error: {0}")]
    Network(String),

    /// The remote rejected the request with a non-2xx status.
    #[error("api error {status}: {body}")]
    Http { status: u16, body: String },

    /// The remote call exceeded its timeout.
    #[error("operation timed out")]
    Timeout,

    /// Local store error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No remote endpoint is configured for this entity kind.
    #[error("no endpoint configured for entity type: {0}")]
    EndpointNotConfigured(EntityKind),

    /// The upload operation is only supported for photos.
    #[error("upload not supported for entity type: {0}")]
    UploadUnsupported(EntityKind),

    /// The queue item's payload shape does not match its entity kind.
    #[error("payload does not match entity type: {0}")]
    PayloadMismatch(EntityKind),

    /// An upload item's photo bytes are missing from the local store.
    #[error("blob not found")]
    BlobNotFound,
}

impl SyncError {
    /// Whether this failure is permanent for the item that hit it.
    ///
    /// Transient failures (network, timeout, 5xx, 408, 429) are requeued
    /// until the item exhausts its attempts; terminal ones mark the item
    /// `failed` immediately.
    pub fn is_terminal(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Timeout | SyncError::Storage(_) => false,
            SyncError::Http { status, .. } => {
                !(*status >= 500 || *status == 408 || *status == 429)
            }
            SyncError::Serialization(_)
            | SyncError::EndpointNotConfigured(_)
            | SyncError::UploadUnsupported(_)
            | SyncError::PayloadMismatch(_)
            | SyncError::BlobNotFound => true,
        }
    }
}
