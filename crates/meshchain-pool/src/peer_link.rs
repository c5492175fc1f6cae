//! The two trait boundaries between the pool & block engine (C4) and the
//! inter-node RPC layer (C5). `meshchain-net` depends on this crate, not the
//! other way around: it implements [`PeerLink`] to let the engine call out,
//! and calls into [`InboundHandler`] (implemented by [`crate::PoolEngine`])
//! to dispatch an inbound Request packet. Neither trait mentions `Packet` —
//! that wire encoding is entirely C5's concern; C4 only ever
//! sees typed domain calls, never a raw `Packet`.

use async_trait::async_trait;
use meshchain_types::{Block, Hash32, MeshResult, Tx};

/// A peer's reported chain position, as returned by `sys/syncblocked`'s
/// height probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerHead {
    pub height: u64,
    pub hash:   Hash32
}

/// Outbound capability the pool & block engine needs from the RPC layer.
/// Implemented by `meshchain-net`'s connection-managing handle.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Node identities of every peer currently configured, reachable or not.
    fn known_peers(&self) -> Vec<String>;

    /// Delivers `tx` to `peer` and awaits its `ResultSuccess`/`ResultFailure`
    /// reply. `PeerTimeout` on timeout, `PeerDisconnected` if no connection
    /// could be established or maintained for the round trip.
    async fn deliver_tx(&self, peer: &str, tx: &Tx) -> MeshResult<()>;

    /// Asks `peer` for its current chain head.
    async fn peer_head(&self, peer: &str) -> MeshResult<PeerHead>;

    /// Fetches every block strictly after `from_height` that `peer` holds,
    /// oldest-first, for catch-up.
    async fn fetch_blocks_from(&self, peer: &str, from_height: u64) -> MeshResult<Vec<Block>>;
}

/// Inbound capability the RPC layer needs from the pool & block engine, one
/// method per kind of Request a peer can send over the `interconnect`
/// stream. Implemented by [`crate::PoolEngine`].
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// A peer delivering a Tx to us: insert directly into `delivered`,
    /// bypassing `pooled` entirely.
    async fn on_deliver_tx(&self, tx: Tx) -> MeshResult<()>;

    async fn on_head_query(&self) -> MeshResult<PeerHead>;

    async fn on_fetch_blocks(&self, from_height: u64) -> MeshResult<Vec<Block>>;
}
