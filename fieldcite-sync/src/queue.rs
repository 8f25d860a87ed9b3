//! The durable sync queue: a typed facade over the `sync_queue` collection.

use crate::error::SyncResult;
use crate::schema::SYNC_QUEUE;
use chrono::{Duration, Utc};
use fieldcite_store::{Key, Query, Store};
use fieldcite_types::{
    EntityId, EntityKind, MutationPayload, Operation, Priority, QueueStatus, SyncQueueItem,
};
use serde_json::json;
use tracing::debug;

/// Typed access to the pending-mutation queue.
///
/// Cheap to clone — clones share the underlying store.
#[derive(Clone)]
pub struct SyncQueue {
    store: Store,
}

impl SyncQueue {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Persists a new pending item and returns it with its assigned key.
    /// Returns immediately — delivery happens on a later sync pass.
    pub fn enqueue(
        &self,
        operation: Operation,
        entity_type: EntityKind,
        entity_id: EntityId,
        payload: MutationPayload,
        priority: Priority,
    ) -> SyncResult<SyncQueueItem> {
        let mut item = SyncQueueItem::new(operation, entity_type, entity_id, payload, priority);
        if let Key::Int(id) = self.store.add(SYNC_QUEUE, &item)? {
            item.id = Some(id);
        }
        debug!(
            "queued {} {} for {} (priority {})",
            operation, entity_type, entity_id, priority
        );
        Ok(item)
    }

    /// Up to `limit` pending items, ordered by ascending priority then
    /// creation time then key — stable FIFO within a priority band.
    pub fn pending_batch(&self, limit: usize) -> SyncResult<Vec<SyncQueueItem>> {
        let mut items: Vec<SyncQueueItem> = self.store.query(
            SYNC_QUEUE,
            &Query::new().index("status").only(json!("pending")),
        )?;
        items.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        items.truncate(limit);
        Ok(items)
    }

    /// Claims an item for delivery. Only one pass runs at a time, so at most
    /// one item is ever `processing` per store.
    pub fn mark_processing(&self, item: &mut SyncQueueItem) -> SyncResult<()> {
        item.status = QueueStatus::Processing;
        self.store.put(SYNC_QUEUE, item)?;
        Ok(())
    }

    /// Records a confirmed delivery.
    pub fn mark_completed(&self, item: &mut SyncQueueItem) -> SyncResult<()> {
        item.status = QueueStatus::Completed;
        item.processed_at = Some(Utc::now());
        item.last_error = None;
        self.store.put(SYNC_QUEUE, item)?;
        Ok(())
    }

    /// Records a transient failure: the attempt is consumed and the item is
    /// requeued for a later pass.
    pub fn mark_retry(&self, item: &mut SyncQueueItem, error: &str) -> SyncResult<()> {
        item.attempts += 1;
        item.status = QueueStatus::Pending;
        item.last_error = Some(error.to_string());
        self.store.put(SYNC_QUEUE, item)?;
        Ok(())
    }

    /// Records a terminal failure. The item stays visible until an explicit
    /// retry or purge — failed work is never silently discarded.
    pub fn mark_failed(&self, item: &mut SyncQueueItem, error: &str) -> SyncResult<()> {
        item.attempts += 1;
        item.status = QueueStatus::Failed;
        item.last_error = Some(error.to_string());
        self.store.put(SYNC_QUEUE, item)?;
        Ok(())
    }

    /// Deletes completed items whose `processed_at` is older than the
    /// retention window. Returns how many were removed.
    pub fn purge_completed_older_than(&self, retention: Duration) -> SyncResult<usize> {
        let cutoff = Utc::now() - retention;
        let completed: Vec<SyncQueueItem> = self.store.query(
            SYNC_QUEUE,
            &Query::new().index("status").only(json!("completed")),
        )?;

        let mut purged = 0;
        for item in completed {
            let (Some(processed_at), Some(id)) = (item.processed_at, item.id) else {
                continue;
            };
            if processed_at < cutoff {
                self.store.delete(SYNC_QUEUE, id)?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    /// Revives every terminal item: back to pending with zero attempts and
    /// the last error cleared. Returns how many were revived. This is the
    /// only path that revives terminal items.
    pub fn reset_failed(&self) -> SyncResult<usize> {
        let failed = self.failed_items()?;
        let count = failed.len();
        for mut item in failed {
            item.status = QueueStatus::Pending;
            item.attempts = 0;
            item.last_error = None;
            self.store.put(SYNC_QUEUE, &item)?;
        }
        Ok(count)
    }

    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.status_items(QueueStatus::Pending)?.len())
    }

    pub fn failed_count(&self) -> SyncResult<usize> {
        Ok(self.status_items(QueueStatus::Failed)?.len())
    }

    /// All terminally failed items, for display and manual retry.
    pub fn failed_items(&self) -> SyncResult<Vec<SyncQueueItem>> {
        self.status_items(QueueStatus::Failed)
    }

    fn status_items(&self, status: QueueStatus) -> SyncResult<Vec<SyncQueueItem>> {
        Ok(self.store.query(
            SYNC_QUEUE,
            &Query::new().index("status").only(json!(status.as_str())),
        )?)
    }
}
