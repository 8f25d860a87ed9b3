//! Offline sync engine for fieldcite.
//!
//! Officers issue tickets in the field with no connectivity; every mutation
//! is written to a durable local queue first, then flushed to the central
//! server when a network is available. This crate is that flush machinery:
//!
//! - **Queue**: a durable, priority-ordered collection of pending mutations
//! - **Engine**: drains bounded batches against the remote API with bounded
//!   retries and a server-wins conflict policy
//! - **Triggers**: connectivity transitions, a periodic timer, explicit
//!   caller requests, and an optional platform deferred-wake capability
//! - **Log**: a capped, time-ordered history of engine lifecycle events
//!
//! # Delivery semantics
//!
//! At-least-once delivery with idempotent server-side handling assumed as an
//! external contract. A successful server response is accepted verbatim as
//! ground truth; no local merge logic exists.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fieldcite_sync::{
//!     open_store_in_memory, ConnectivityMonitor, EngineConfig, HttpRemoteApi,
//!     NoopDeferredSync, RemoteConfig, StaticSession, SyncEngine,
//! };
//!
//! let store = open_store_in_memory().unwrap();
//! let session = Arc::new(StaticSession::anonymous());
//! let api = Arc::new(HttpRemoteApi::new(RemoteConfig::default(), session));
//! let connectivity = ConnectivityMonitor::new(true);
//! let engine = SyncEngine::new(
//!     store,
//!     api,
//!     connectivity,
//!     Arc::new(NoopDeferredSync),
//!     EngineConfig::default(),
//! );
//! ```

mod connectivity;
mod engine;
mod error;
mod log;
mod queue;
mod remote;
mod scheduler;
mod schema;
mod session;
mod wake;

pub use connectivity::ConnectivityMonitor;
pub use engine::{EngineConfig, PassOutcome, SyncEngine, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use log::{SyncLog, MAX_LOG_ENTRIES};
pub use queue::SyncQueue;
pub use remote::{HttpRemoteApi, RemoteAck, RemoteApi, RemoteConfig, Upload};
pub use scheduler::SyncScheduler;
pub use schema::{
    open_store, open_store_in_memory, schema, PAYMENTS, PHOTOS, SCHEMA_VERSION, SYNC_LOGS,
    SYNC_QUEUE, TICKETS,
};
pub use session::{SessionProvider, StaticSession};
pub use wake::{DeferredSync, NoopDeferredSync, SYNC_WAKE_TAG};
