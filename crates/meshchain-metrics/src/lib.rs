//! Thin, cloneable wrapper around the `metrics` facade, so call sites record
//! through named helper methods instead of calling `gauge!`/`histogram!`
//! inline everywhere. No Non-goal excludes observability, so this stays in
//! scope regardless of the incentive/consensus exclusions.

use std::time::Duration;

const POOL_DEPTH: &str = "meshchain_pool_depth";
const DELIVERED_DEPTH: &str = "meshchain_delivered_depth";
const CHAIN_HEIGHT: &str = "meshchain_chain_height";
const SEAL_DURATION: &str = "meshchain_seal_duration_seconds";
const RPC_ROUND_TRIP: &str = "meshchain_rpc_round_trip_seconds";
const DELIVERY_FAILURES: &str = "meshchain_delivery_failures_total";

/// Registers every metric this node emits with its description, so a
/// `/metrics` scrape carries human-readable `HELP` text from the first
/// sample onward.
pub fn describe() {
    metrics::describe_gauge!(POOL_DEPTH, "Number of Txs currently in the pooled state");
    metrics::describe_gauge!(DELIVERED_DEPTH, "Number of Txs currently in the delivered state");
    metrics::describe_gauge!(CHAIN_HEIGHT, "Height of the last sealed block");
    metrics::describe_histogram!(SEAL_DURATION, "Wall-clock time spent sealing one block");
    metrics::describe_histogram!(RPC_ROUND_TRIP, "Round-trip time of one peer RPC request");
    metrics::describe_counter!(DELIVERY_FAILURES, "Number of peer delivery attempts that failed");
}

/// Cheap, `Clone`-able handle passed to the pool & block engine and the RPC
/// layer so call sites record metrics without reaching for the global
/// `metrics` macros directly.
#[derive(Clone, Copy, Default)]
pub struct MeshMetrics;

impl MeshMetrics {
    pub fn set_pool_depth(&self, node: &str, depth: usize) {
        metrics::gauge!(POOL_DEPTH, "node" => node.to_string()).set(depth as f64);
    }

    pub fn set_delivered_depth(&self, node: &str, depth: usize) {
        metrics::gauge!(DELIVERED_DEPTH, "node" => node.to_string()).set(depth as f64);
    }

    pub fn set_chain_height(&self, node: &str, height: u64) {
        metrics::gauge!(CHAIN_HEIGHT, "node" => node.to_string()).set(height as f64);
    }

    pub fn record_seal_duration(&self, node: &str, elapsed: Duration) {
        metrics::histogram!(SEAL_DURATION, "node" => node.to_string()).record(elapsed.as_secs_f64());
    }

    pub fn record_rpc_round_trip(&self, peer: String, elapsed: Duration) {
        metrics::histogram!(RPC_ROUND_TRIP, "peer" => peer).record(elapsed.as_secs_f64());
    }

    pub fn incr_delivery_failure(&self, peer: String) {
        metrics::counter!(DELIVERY_FAILURES, "peer" => peer).increment(1);
    }
}
