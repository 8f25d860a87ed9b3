//! Network reachability signal.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Observable online/offline flag.
///
/// The platform layer feeds reachability transitions in via `set_online`;
/// the engine guard reads `is_online` and the scheduler watches transitions
/// through `subscribe`. Cheap to clone — clones share the same channel.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_replace(online) != online;
        if changed {
            info!("connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    /// A receiver that observes every online/offline transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
