//! Core type definitions for the fieldcite offline sync engine.
//!
//! This crate defines the fundamental types shared by the store and sync
//! layers:
//! - Entity identifiers (UUID v7)
//! - Domain entity records (tickets, photos, payments) with their sync flags
//! - Sync queue items and the tagged mutation payload union
//! - Sync log entries
//!
//! Page/UI-level types (form state, print layouts, dashboards) do not belong
//! here — only what the sync core persists and replays.

mod entities;
mod ids;
mod log;
mod queue;

pub use entities::{Payment, PhotoKind, PhotoRecord, Ticket};
pub use ids::EntityId;
pub use log::{SyncLogEntry, SyncLogKind};
pub use queue::{
    EntityKind, MutationPayload, Operation, Priority, QueueStatus, SyncQueueItem,
    DEFAULT_MAX_ATTEMPTS,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
