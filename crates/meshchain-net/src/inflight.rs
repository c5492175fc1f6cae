//! The `inflight: packet_id -> waiter` correlation map, its own
//! mutex, O(1) lookups.

use std::collections::HashMap;

use meshchain_types::Payload;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use uuid::Uuid;

pub struct InflightMap {
    waiters: Mutex<HashMap<Uuid, oneshot::Sender<Payload>>>
}

impl InflightMap {
    pub fn new() -> Self {
        Self { waiters: Mutex::new(HashMap::new()) }
    }

    pub fn register(&self, packet_id: Uuid) -> oneshot::Receiver<Payload> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(packet_id, tx);
        rx
    }

    pub fn cancel(&self, packet_id: Uuid) {
        self.waiters.lock().remove(&packet_id);
    }

    /// Resolves the waiter for `packet_id` with `payload`. A second call for
    /// the same id (a duplicate reply) finds nothing and is a no-op — duplicate
    /// replies are simply discarded.
    pub fn resolve(&self, packet_id: Uuid, payload: Payload) {
        if let Some(tx) = self.waiters.lock().remove(&packet_id) {
            let _ = tx.send(payload);
        } else {
            tracing::debug!(%packet_id, "reply for unknown or already-resolved packet dropped");
        }
    }

    /// Cancels every outstanding waiter, e.g. when a peer stream dies with
    /// `PeerDisconnected`.
    pub fn cancel_all(&self) {
        self.waiters.lock().clear();
    }
}

impl Default for InflightMap {
    fn default() -> Self {
        Self::new()
    }
}
