//! Sync queue item types.
//!
//! A `SyncQueueItem` is the unit of pending offline work: one mutation to
//! replay against the remote API. Items are always queued, whether or not
//! the device is currently offline — the write path is "queue, then flush".

use crate::entities::{Payment, PhotoKind, Ticket};
use crate::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery attempts allowed before an item is marked terminally failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// The remote mutation an item replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Upload,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Upload => "upload",
        };
        write!(f, "{s}")
    }
}

/// The kind of domain entity a queue item affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Ticket,
    Photo,
    Payment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Ticket => "ticket",
            EntityKind::Photo => "photo",
            EntityKind::Payment => "payment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Queue item delivery state. Transitions only move forward:
/// `Pending → Processing → {Completed | Pending | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Failed,
    Completed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Failed => "failed",
            QueueStatus::Completed => "completed",
        }
    }
}

/// Delivery priority: 1 is serviced first, 5 last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(3);
    pub const LOWEST: Priority = Priority(5);

    /// Creates a priority, clamped to the valid 1..=5 band.
    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 5))
    }

    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The domain data an item needs to replay its mutation remotely.
///
/// One concrete shape per entity kind, decoded at the point of remote
/// dispatch. `Empty` is for operations that carry no body (deletes; uploads
/// resolve their bytes from the photo record instead of the queue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MutationPayload {
    Ticket(Ticket),
    Photo {
        ticket_id: EntityId,
        photo_kind: PhotoKind,
    },
    Payment(Payment),
    Empty,
}

impl MutationPayload {
    /// Whether this payload shape is valid for the given entity kind.
    pub fn matches(&self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (MutationPayload::Ticket(_), EntityKind::Ticket)
                | (MutationPayload::Photo { .. }, EntityKind::Photo)
                | (MutationPayload::Payment(_), EntityKind::Payment)
                | (MutationPayload::Empty, _)
        )
    }
}

/// One pending mutation in the durable sync queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    /// Store-assigned, monotonically increasing key. `None` until persisted.
    pub id: Option<i64>,
    pub operation: Operation,
    pub entity_type: EntityKind,
    pub entity_id: EntityId,
    pub payload: MutationPayload,
    pub priority: Priority,
    pub status: QueueStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl SyncQueueItem {
    /// Creates a fresh pending item with zero attempts.
    pub fn new(
        operation: Operation,
        entity_type: EntityKind,
        entity_id: EntityId,
        payload: MutationPayload,
        priority: Priority,
    ) -> Self {
        Self {
            id: None,
            operation,
            entity_type,
            entity_id,
            payload,
            priority,
            status: QueueStatus::Pending,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            last_error: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Whether the item has exhausted its delivery attempts.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}
