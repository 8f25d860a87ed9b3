//! Trigger layer: decides when to invoke the sync worker.
//!
//! Triggers a pass on the offline → online transition and on a recurring
//! timer while online. All triggers are idempotent — the engine's running
//! guard coalesces anything that arrives mid-pass.

use crate::engine::SyncEngine;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Background task driving periodic and connectivity-based sync triggers.
pub struct SyncScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawns the trigger task. The interval comes from the engine config;
    /// the first tick fires one full interval after start.
    pub fn start(engine: Arc<SyncEngine>) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let interval = engine.config().sync_interval;
        let mut online_rx = engine.connectivity().subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut was_online = *online_rx.borrow();

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("sync scheduler stopping");
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if *online_rx.borrow() {
                            engine.run_pass().await;
                        }
                    }
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *online_rx.borrow();
                        if online && !was_online {
                            info!("back online, triggering sync");
                            engine.run_pass().await;
                        }
                        was_online = online;
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stops the trigger task. The shutdown signal is only observed between
    /// passes, so an in-flight pass runs to completion first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
