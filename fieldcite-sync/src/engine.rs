//! The sync engine: turns queued mutations into remote effects.
//!
//! One logical worker lane — at most one sync pass runs at a time, enforced
//! by an in-memory flag checked at pass entry. Triggers that arrive during a
//! running pass are dropped, not queued; the next periodic or connectivity
//! trigger picks up remaining work.
//!
//! The engine is an explicit instance with its dependencies injected; tests
//! construct as many independent engines as they need.

use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::log::SyncLog;
use crate::queue::SyncQueue;
use crate::remote::{RemoteAck, RemoteApi, Upload};
use crate::schema::{PAYMENTS, PHOTOS, TICKETS};
use crate::wake::{DeferredSync, SYNC_WAKE_TAG};
use chrono::{DateTime, Duration, Utc};
use fieldcite_store::Store;
use fieldcite_types::{
    EntityId, EntityKind, MutationPayload, Operation, Payment, PhotoRecord, Priority, SyncLogEntry,
    SyncLogKind, SyncQueueItem, Ticket,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Items fetched per pass.
    pub batch_size: usize,
    /// How long completed items are retained before the cleanup step
    /// removes them.
    pub retention: Duration,
    /// Periodic trigger interval while online.
    pub sync_interval: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            retention: Duration::hours(24),
            sync_interval: std::time::Duration::from_secs(30),
        }
    }
}

/// Result of one sync pass. `failed` counts items that became terminal
/// during this pass; transient requeues count toward neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub success: usize,
    pub failed: usize,
}

/// Snapshot of engine state, recomputed on demand from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_running: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub pending_count: usize,
    pub failed_count: usize,
}

/// The sync worker. Construct one per store; share it behind an `Arc`.
pub struct SyncEngine {
    store: Store,
    queue: SyncQueue,
    log: SyncLog,
    api: Arc<dyn RemoteApi>,
    connectivity: ConnectivityMonitor,
    wake: Arc<dyn DeferredSync>,
    config: EngineConfig,
    running: AtomicBool,
    status_tx: broadcast::Sender<SyncStatus>,
}

impl SyncEngine {
    pub fn new(
        store: Store,
        api: Arc<dyn RemoteApi>,
        connectivity: ConnectivityMonitor,
        wake: Arc<dyn DeferredSync>,
        config: EngineConfig,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(16);
        Self {
            queue: SyncQueue::new(store.clone()),
            log: SyncLog::new(store.clone()),
            store,
            api,
            connectivity,
            wake,
            config,
            running: AtomicBool::new(false),
            status_tx,
        }
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn log(&self) -> &SyncLog {
        &self.log
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Persists a mutation for later delivery. Always queues, online or not;
    /// when online, additionally requests a deferred wake so the flush
    /// happens soon.
    pub fn enqueue(
        &self,
        operation: Operation,
        entity_type: EntityKind,
        entity_id: EntityId,
        payload: MutationPayload,
        priority: Priority,
    ) -> SyncResult<SyncQueueItem> {
        let item = self
            .queue
            .enqueue(operation, entity_type, entity_id, payload, priority)?;
        if self.connectivity.is_online() {
            self.wake.request_wake(SYNC_WAKE_TAG);
        }
        Ok(item)
    }

    /// Runs one sync pass: drain a priority-ordered batch against the remote
    /// API. A no-op returning zero counts when offline or when a pass is
    /// already running. Never leaves the engine stuck in the running state.
    pub async fn run_pass(&self) -> PassOutcome {
        if !self.connectivity.is_online() {
            debug!("offline, skipping sync pass");
            return PassOutcome::default();
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync pass already running, skipping");
            return PassOutcome::default();
        }

        let outcome = self.pass_inner().await;

        self.running.store(false, Ordering::SeqCst);
        self.notify();
        outcome
    }

    /// The pass body. Every failure in here is caught and logged so the
    /// caller always transitions back to idle.
    async fn pass_inner(&self) -> PassOutcome {
        let started = Instant::now();
        self.append_log(SyncLogEntry::new(
            SyncLogKind::SyncStart,
            "starting sync pass",
        ));
        self.notify();

        let batch = match self.queue.pending_batch(self.config.batch_size) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("failed to read pending batch: {e}");
                self.append_log(SyncLogEntry::new(
                    SyncLogKind::SyncError,
                    format!("sync pass error: {e}"),
                ));
                return PassOutcome::default();
            }
        };

        info!("processing {} queued items", batch.len());
        let mut outcome = PassOutcome::default();
        for mut item in batch {
            self.process_item(&mut item, &mut outcome).await;
        }

        match self.queue.purge_completed_older_than(self.config.retention) {
            Ok(purged) if purged > 0 => debug!("purged {purged} completed items"),
            Ok(_) => {}
            Err(e) => warn!("completed-item cleanup failed: {e}"),
        }

        let duration = started.elapsed().as_millis() as u64;
        let mut entry = SyncLogEntry::new(
            SyncLogKind::SyncComplete,
            format!(
                "sync completed: {} success, {} failed",
                outcome.success, outcome.failed
            ),
        );
        entry.item_count = Some(outcome.success + outcome.failed);
        entry.duration = Some(duration);
        self.append_log(entry);

        outcome
    }

    /// Delivers one item. An item's failure never aborts the batch.
    async fn process_item(&self, item: &mut SyncQueueItem, outcome: &mut PassOutcome) {
        if let Err(e) = self.queue.mark_processing(item) {
            // Leave the item pending for the next pass.
            warn!("failed to claim queue item {:?}: {e}", item.id);
            return;
        }

        match self.dispatch(item).await {
            Ok(ack) => {
                if let Err(e) = self.queue.mark_completed(item) {
                    warn!("failed to persist completion for {:?}: {e}", item.id);
                }
                if let Err(e) = self.mark_entity_synced(item, &ack) {
                    warn!("failed to stamp sync flags for {}: {e}", item.entity_id);
                }
                outcome.success += 1;
                debug!(
                    "synced {} {} {}",
                    item.operation, item.entity_type, item.entity_id
                );
            }
            Err(err) => {
                let message = err.to_string();
                let terminal = err.is_terminal() || item.attempts + 1 >= item.max_attempts;
                if terminal {
                    if let Err(e) = self.queue.mark_failed(item, &message) {
                        warn!("failed to persist failure for {:?}: {e}", item.id);
                    }
                    outcome.failed += 1;
                    warn!(
                        "{} {} for {} failed terminally: {message}",
                        item.operation, item.entity_type, item.entity_id
                    );
                    self.append_log(SyncLogEntry::new(
                        SyncLogKind::SyncError,
                        format!("failed after {} attempts: {message}", item.attempts),
                    ));
                } else {
                    if let Err(e) = self.queue.mark_retry(item, &message) {
                        warn!("failed to requeue {:?}: {e}", item.id);
                    }
                    debug!(
                        "requeued {} {} for {} (attempt {}/{}): {message}",
                        item.operation,
                        item.entity_type,
                        item.entity_id,
                        item.attempts,
                        item.max_attempts
                    );
                }
            }
        }
    }

    /// Builds and sends the remote request for one item. The payload union
    /// is decoded here, at the point of dispatch.
    async fn dispatch(&self, item: &SyncQueueItem) -> SyncResult<RemoteAck> {
        if !item.payload.matches(item.entity_type) {
            return Err(SyncError::PayloadMismatch(item.entity_type));
        }

        match item.operation {
            Operation::Create => {
                self.api
                    .create(item.entity_type, &payload_body(&item.payload)?)
                    .await
            }
            Operation::Update => {
                self.api
                    .update(
                        item.entity_type,
                        &item.entity_id,
                        &payload_body(&item.payload)?,
                    )
                    .await
            }
            Operation::Delete => self.api.delete(item.entity_type, &item.entity_id).await,
            Operation::Upload => {
                if item.entity_type != EntityKind::Photo {
                    return Err(SyncError::UploadUnsupported(item.entity_type));
                }
                let photo: PhotoRecord = self
                    .store
                    .get(PHOTOS, item.entity_id)?
                    .ok_or(SyncError::BlobNotFound)?;
                if photo.bytes.is_empty() {
                    return Err(SyncError::BlobNotFound);
                }
                let upload = Upload {
                    file_name: format!("{}.jpg", item.entity_id),
                    bytes: photo.bytes,
                    mime_type: photo.mime_type,
                    ticket_id: photo.ticket_id,
                    photo_kind: photo.kind,
                };
                self.api
                    .upload(item.entity_type, &item.entity_id, upload)
                    .await
            }
        }
    }

    /// Stamps the owning entity's sync flags after a confirmed 2xx. Only the
    /// engine mutates these — never the UI layer.
    fn mark_entity_synced(&self, item: &SyncQueueItem, ack: &RemoteAck) -> SyncResult<()> {
        if item.operation == Operation::Delete {
            return Ok(());
        }
        let now = Utc::now();
        match item.entity_type {
            EntityKind::Ticket => {
                if let Some(mut ticket) = self.store.get::<Ticket>(TICKETS, item.entity_id)? {
                    ticket.is_synced = true;
                    ticket.synced_at = Some(now);
                    self.store.put(TICKETS, &ticket)?;
                }
            }
            EntityKind::Payment => {
                if let Some(mut payment) = self.store.get::<Payment>(PAYMENTS, item.entity_id)? {
                    payment.is_synced = true;
                    payment.synced_at = Some(now);
                    self.store.put(PAYMENTS, &payment)?;
                }
            }
            EntityKind::Photo => {
                if let Some(mut photo) = self.store.get::<PhotoRecord>(PHOTOS, item.entity_id)? {
                    photo.is_synced = true;
                    photo.synced_at = Some(now);
                    if item.operation == Operation::Upload {
                        photo.synced_url = ack.url.clone();
                    }
                    self.store.put(PHOTOS, &photo)?;
                }
            }
        }
        Ok(())
    }

    /// Revives every terminal item and immediately runs a pass. This is the
    /// only path that revives terminal items — the worker never auto-revives
    /// them. Returns how many were revived.
    pub async fn retry_failed(&self) -> SyncResult<usize> {
        let revived = self.queue.reset_failed()?;
        info!("retrying {revived} failed items");
        self.append_log(SyncLogEntry::new(
            SyncLogKind::Retry,
            format!("retrying {revived} failed items"),
        ));
        self.run_pass().await;
        Ok(revived)
    }

    /// Current engine status, recomputed from the store.
    pub fn status(&self) -> SyncResult<SyncStatus> {
        Ok(SyncStatus {
            is_running: self.running.load(Ordering::SeqCst),
            last_sync: self.log.last_completed_at()?,
            pending_count: self.queue.pending_count()?,
            failed_count: self.queue.failed_count()?,
        })
    }

    /// Subscribes to status snapshots emitted around each pass. Snapshots
    /// are immutable; a slow subscriber can never block the pass.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    fn notify(&self) {
        match self.status() {
            Ok(status) => {
                let _ = self.status_tx.send(status);
            }
            Err(e) => warn!("failed to compute status snapshot: {e}"),
        }
    }

    /// Log writes are diagnostics; a failing log write never fails the pass.
    fn append_log(&self, entry: SyncLogEntry) {
        if let Err(e) = self.log.append(&entry) {
            warn!("failed to append sync log entry: {e}");
        }
    }
}

fn payload_body(payload: &MutationPayload) -> SyncResult<Value> {
    match payload {
        MutationPayload::Ticket(ticket) => Ok(serde_json::to_value(ticket)?),
        MutationPayload::Payment(payment) => Ok(serde_json::to_value(payment)?),
        MutationPayload::Photo { .. } => Ok(serde_json::to_value(payload)?),
        MutationPayload::Empty => Ok(Value::Null),
    }
}
