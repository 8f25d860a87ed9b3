//! The application store schema: collections and their indexes.
//!
//! Declared once and applied idempotently when the store is opened. Index
//! fields reference the camelCase names the records serialize with.

use fieldcite_store::{CollectionDef, IndexDef, Schema, Store, StoreResult};
use std::path::Path;

pub const TICKETS: &str = "tickets";
pub const PHOTOS: &str = "photos";
pub const PAYMENTS: &str = "payments";
pub const SYNC_QUEUE: &str = "sync_queue";
pub const SYNC_LOGS: &str = "sync_logs";

/// Bumped whenever a collection or index is added.
pub const SCHEMA_VERSION: u32 = 2;

/// The full declared schema for the fieldcite local store.
pub fn schema() -> Schema {
    Schema::new(SCHEMA_VERSION)
        .collection(
            CollectionDef::keyed(TICKETS, "id")
                .with_index(IndexDef::unique("ticketNumber", "ticketNumber"))
                .with_index(IndexDef::new("status", "status"))
                .with_index(IndexDef::new("isSynced", "isSynced"))
                .with_index(IndexDef::new("createdAt", "createdAt")),
        )
        .collection(
            CollectionDef::keyed(PHOTOS, "id")
                .with_index(IndexDef::new("ticketId", "ticketId"))
                .with_index(IndexDef::new("isSynced", "isSynced"))
                .with_index(IndexDef::new("capturedAt", "capturedAt")),
        )
        .collection(
            CollectionDef::keyed(PAYMENTS, "id")
                .with_index(IndexDef::unique("reference", "reference"))
                .with_index(IndexDef::new("ticketId", "ticketId"))
                .with_index(IndexDef::new("status", "status"))
                .with_index(IndexDef::new("createdAt", "createdAt")),
        )
        .collection(
            CollectionDef::auto(SYNC_QUEUE)
                .with_index(IndexDef::new("status", "status"))
                .with_index(IndexDef::new("priority", "priority"))
                .with_index(IndexDef::new("entityType", "entityType"))
                .with_index(IndexDef::new("entityId", "entityId"))
                .with_index(IndexDef::new("operation", "operation"))
                .with_index(IndexDef::new("createdAt", "createdAt")),
        )
        .collection(
            CollectionDef::auto(SYNC_LOGS)
                .with_index(IndexDef::new("type", "type"))
                .with_index(IndexDef::new("timestamp", "timestamp")),
        )
}

/// Opens (or creates) the application store at the given path.
pub fn open_store(path: impl AsRef<Path>) -> StoreResult<Store> {
    Store::open(path, schema())
}

/// Opens an in-memory application store (for testing).
pub fn open_store_in_memory() -> StoreResult<Store> {
    Store::open_in_memory(schema())
}
