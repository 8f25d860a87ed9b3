//! Capped diagnostic history of engine lifecycle events.

use crate::error::SyncResult;
use crate::schema::SYNC_LOGS;
use chrono::{DateTime, Utc};
use fieldcite_store::{Direction, Query, Store};
use fieldcite_types::{SyncLogEntry, SyncLogKind};
use serde_json::json;

/// Entries kept after trimming; older ones are evicted.
pub const MAX_LOG_ENTRIES: usize = 100;

/// Append-only sync log backed by the `sync_logs` collection.
#[derive(Clone)]
pub struct SyncLog {
    store: Store,
}

impl SyncLog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Writes an entry, then trims the log back to the cap.
    ///
    /// The trim is best-effort housekeeping, not transactional with the
    /// write — an overshoot by one entry under concurrent writers is
    /// acceptable.
    pub fn append(&self, entry: &SyncLogEntry) -> SyncResult<()> {
        self.store.add(SYNC_LOGS, entry)?;
        self.trim()
    }

    fn trim(&self) -> SyncResult<()> {
        let count = self.store.count(SYNC_LOGS)?;
        if count <= MAX_LOG_ENTRIES {
            return Ok(());
        }
        let oldest: Vec<SyncLogEntry> = self.store.query(
            SYNC_LOGS,
            &Query::new()
                .index("timestamp")
                .limit(count - MAX_LOG_ENTRIES),
        )?;
        for entry in oldest {
            if let Some(id) = entry.id {
                self.store.delete(SYNC_LOGS, id)?;
            }
        }
        Ok(())
    }

    /// The newest entries, most recent first.
    pub fn recent(&self, limit: usize) -> SyncResult<Vec<SyncLogEntry>> {
        Ok(self.store.query(
            SYNC_LOGS,
            &Query::new()
                .index("timestamp")
                .direction(Direction::Reverse)
                .limit(limit),
        )?)
    }

    /// When the last sync pass completed, from the newest `sync_complete`
    /// entry.
    pub fn last_completed_at(&self) -> SyncResult<Option<DateTime<Utc>>> {
        let entries: Vec<SyncLogEntry> = self.store.query(
            SYNC_LOGS,
            &Query::new()
                .index("type")
                .only(json!(SyncLogKind::SyncComplete.as_str()))
                .direction(Direction::Reverse)
                .limit(1),
        )?;
        Ok(entries.first().map(|e| e.timestamp))
    }

    pub fn count(&self) -> SyncResult<usize> {
        Ok(self.store.count(SYNC_LOGS)?)
    }
}
