//! Sync log entry types.
//!
//! Append-only diagnostic records of engine lifecycle events. The log is
//! capped (see the sync crate) so it never grows past recent history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogKind {
    SyncStart,
    SyncComplete,
    SyncError,
    Conflict,
    Retry,
}

impl SyncLogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogKind::SyncStart => "sync_start",
            SyncLogKind::SyncComplete => "sync_complete",
            SyncLogKind::SyncError => "sync_error",
            SyncLogKind::Conflict => "conflict",
            SyncLogKind::Retry => "retry",
        }
    }
}

/// One diagnostic record in the capped sync log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    /// Store-assigned key. `None` until persisted.
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: SyncLogKind,
    pub details: String,
    pub item_count: Option<usize>,
    /// Elapsed milliseconds, present on `sync_complete`.
    pub duration: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl SyncLogEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(kind: SyncLogKind, details: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            details: details.into(),
            item_count: None,
            duration: None,
            timestamp: Utc::now(),
        }
    }
}
