//! Breaks the construction cycle between [`meshchain_net::NetworkHandle`]
//! (needs an inbound handler) and [`meshchain_pool::PoolEngine`] (needs a
//! peer link, which is the network handle): the network layer is built
//! first against this shim, and the real [`PoolEngine`] is plugged in with
//! [`DeferredInbound::set`] once it exists. No inbound packet can arrive
//! before the peer listener is spawned, which only happens after wiring
//! completes, so the handler is always set before it is ever called.

use std::sync::Arc;

use async_trait::async_trait;
use meshchain_pool::{InboundHandler, PeerHead, PoolEngine};
use meshchain_types::{mesh_err, Block, ErrorKind, MeshResult, Tx};
use tokio::sync::OnceCell;

const COMPONENT: &str = "meshchain-node";

pub struct DeferredInbound(OnceCell<PoolEngine>);

impl DeferredInbound {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(OnceCell::new()))
    }

    pub fn set(&self, pool: PoolEngine) {
        self.0.set(pool).unwrap_or_else(|_| panic!("inbound handler wired twice"));
    }

    fn pool(&self) -> MeshResult<&PoolEngine> {
        self.0
            .get()
            .ok_or_else(|| mesh_err!(ErrorKind::InternalError, COMPONENT, "pool", "inbound packet arrived before boot finished wiring the pool engine"))
    }
}

#[async_trait]
impl InboundHandler for DeferredInbound {
    async fn on_deliver_tx(&self, tx: Tx) -> MeshResult<()> {
        self.pool()?.on_deliver_tx(tx).await
    }

    async fn on_head_query(&self) -> MeshResult<PeerHead> {
        self.pool()?.on_head_query().await
    }

    async fn on_fetch_blocks(&self, from_height: u64) -> MeshResult<Vec<Block>> {
        self.pool()?.on_fetch_blocks(from_height).await
    }
}
