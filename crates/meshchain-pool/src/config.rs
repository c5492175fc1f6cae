use std::time::Duration;

/// Tunables for the pool & block engine. Populated from
/// `meshchain-config` at boot.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Ingress byte ceiling on `data` before `post/byjson` rejects with
    /// `PayloadTooLarge`.
    pub max_payload_bytes: usize,
    /// How many times `sys/blocking` retries `sealBlock` on `StoreConflict`
    /// before giving up the tick with `BlockingFailed`.
    pub seal_retries: u32,
    /// Per-peer delivery timeout for a single Request/Reply round trip.
    pub delivery_timeout: Duration,
    /// Minimum age a pooled Tx must reach before `postDeliveryPool`
    /// re-attempts delivery on its own.
    pub redeliver_after: Duration
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 256 * 1024,
            seal_retries: 3,
            delivery_timeout: Duration::from_secs(5),
            redeliver_after: Duration::from_secs(30)
        }
    }
}
