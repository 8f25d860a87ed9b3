//! Platform deferred-sync capability.
//!
//! Some platforms can wake the application later to flush queued work even
//! when it is not foregrounded. The capability is selected once at engine
//! construction; platforms without support use the no-op implementation and
//! correctness degrades gracefully to the timer-driven path.

use tracing::debug;

/// Tag passed when the engine requests a wake after enqueueing work.
pub const SYNC_WAKE_TAG: &str = "sync-tickets";

/// Best-effort request to be woken later to run a sync pass.
pub trait DeferredSync: Send + Sync {
    fn request_wake(&self, tag: &str);
}

/// Used when the platform has no deferred-sync facility. Latency falls back
/// to the periodic trigger; correctness is unaffected.
pub struct NoopDeferredSync;

impl DeferredSync for NoopDeferredSync {
    fn request_wake(&self, tag: &str) {
        debug!("deferred sync unavailable, dropping wake request ({tag})");
    }
}
