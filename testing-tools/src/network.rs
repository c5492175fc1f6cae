//! Spins up several fully-wired in-process nodes on real loopback TCP
//! sockets, for the peer-delivery and catch-up behaviors a single node's
//! HTTP API can't exercise: a static full mesh of ledger nodes, each with
//! its own store, pool engine, and network handle.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use meshchain_keyring::Keyring;
use meshchain_metrics::MeshMetrics;
use meshchain_net::{NetworkConfig, NetworkHandle};
use meshchain_pool::{InboundHandler, PeerHead, PeerLink, PoolConfig, PoolEngine};
use meshchain_store::{DataStore, InMemoryStore};
use meshchain_tenant::TenantRegistry;
use meshchain_types::{Block, MeshResult, Tx};
use tokio::sync::{watch, OnceCell};

/// Forwards inbound RPC to a [`PoolEngine`] that doesn't exist yet at the
/// point [`NetworkHandle::new`] needs a handler — the same
/// construction-cycle shim `bin/meshchain-node` uses, duplicated here since
/// a binary crate can't be pulled in as a library dependency.
struct DeferredInbound(OnceCell<PoolEngine>);

impl DeferredInbound {
    fn new() -> Arc<Self> {
        Arc::new(Self(OnceCell::new()))
    }

    fn set(&self, pool: PoolEngine) {
        self.0.set(pool).unwrap_or_else(|_| panic!("inbound handler wired twice"));
    }

    fn pool(&self) -> &PoolEngine {
        self.0.get().expect("inbound packet arrived before the harness finished wiring the node")
    }
}

#[async_trait]
impl InboundHandler for DeferredInbound {
    async fn on_deliver_tx(&self, tx: Tx) -> MeshResult<()> {
        self.pool().on_deliver_tx(tx).await
    }

    async fn on_head_query(&self) -> MeshResult<PeerHead> {
        self.pool().on_head_query().await
    }

    async fn on_fetch_blocks(&self, from_height: u64) -> MeshResult<Vec<Block>> {
        self.pool().on_fetch_blocks(from_height).await
    }
}

/// One fully-wired node: its pool engine, store, network handle and tenant
/// registry, plus the task driving its peer socket.
pub struct MeshNode {
    pub identity: String,
    pub addr: SocketAddr,
    pub store: Arc<dyn DataStore>,
    pub pool: PoolEngine,
    pub net: NetworkHandle,
    pub tenants: Arc<TenantRegistry>,
    listener_task: tokio::task::JoinHandle<std::io::Result<()>>
}

/// A static full mesh of [`MeshNode`]s sharing one shutdown signal, for
/// scenarios that need more than one process's worth of state: cross-node
/// Tx delivery and `sys/syncblocked` catch-up.
pub struct MeshTestnet {
    pub nodes: Vec<MeshNode>,
    shutdown_tx: watch::Sender<bool>
}

impl MeshTestnet {
    /// Reserves `count` loopback ports up front (bind-then-drop, the same
    /// trick `meshchain-net`'s own test module uses) so every node's peer
    /// map — fixed once [`NetworkHandle::new`] is called, with no dynamic
    /// "add peer" API — can name the others' addresses before any listener
    /// is actually running.
    pub async fn spawn(count: usize) -> Self {
        assert!(count >= 1, "a testnet needs at least one node");

        let mut identities = Vec::with_capacity(count);
        let mut addrs = Vec::with_capacity(count);
        for i in 0..count {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
            let addr = listener.local_addr().expect("local_addr");
            drop(listener);
            identities.push(format!("node-{i}"));
            addrs.push(addr);
        }

        // Every node's keyring is generated up front so each can be handed
        // the others' verifying keys — `scan_and_fix_block` needs them to
        // authenticate a peer-sealed block.
        let keyrings: Vec<Arc<Keyring>> = identities.iter().map(|identity| Arc::new(Keyring::generate(identity.clone()))).collect();
        let verifying_keys: Vec<String> = keyrings.iter().map(|k| k.verifying_key_hex()).collect();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut nodes = Vec::with_capacity(count);

        for i in 0..count {
            let identity = identities[i].clone();
            let addr = addrs[i];

            let mut peers = HashMap::new();
            let mut peer_keys = HashMap::new();
            for (j, peer_identity) in identities.iter().enumerate() {
                if j != i {
                    peers.insert(peer_identity.clone(), addrs[j]);
                    peer_keys.insert(peer_identity.clone(), verifying_keys[j].clone());
                }
            }

            // Cluster-uniform: signer-independent, so every node computes
            // the same height-0 hash and `sync_blocked`'s prefix check can
            // ever succeed across nodes.
            let genesis = Block::genesis("", 0);
            let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::new(genesis));
            let keyring = keyrings[i].clone();

            let inbound = DeferredInbound::new();
            let net = NetworkHandle::new(
                NetworkConfig { node_identity: identity.clone(), peers, request_timeout: Duration::from_secs(2) },
                inbound.clone(),
                shutdown_rx.clone()
            );

            let pool = PoolEngine::new(
                store.clone(),
                keyring,
                Arc::new(net.clone()) as Arc<dyn PeerLink>,
                PoolConfig::default(),
                peer_keys,
                MeshMetrics
            );
            inbound.set(pool.clone());

            let listener_task =
                tokio::spawn(meshchain_net::listener::run(addr, identity.clone(), inbound.clone(), shutdown_rx.clone()));

            nodes.push(MeshNode { identity, addr, store, pool, net, tenants: Arc::new(TenantRegistry::new()), listener_task });
        }

        // let every listener actually start accepting before callers dial peers.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self { nodes, shutdown_tx }
    }

    pub fn node(&self, i: usize) -> &MeshNode {
        &self.nodes[i]
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for node in self.nodes {
            let _ = node.listener_task.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use meshchain_pool::SyncOutcome;
    use meshchain_types::{NewTxRequest, TxType};
    use uuid::Uuid;

    use super::*;

    fn now_ms() -> u64 {
        0
    }

    #[tokio::test]
    async fn delivered_tx_lands_on_every_peer() {
        let net = MeshTestnet::spawn(3).await;

        let req = NewTxRequest { tenant: None, tx_type: TxType::New, prev_id: None, data: serde_json::json!({ "desc": "cross-node" }) };
        let id = net.node(0).pool.ingress(Uuid::nil(), req, now_ms(), 1).await.unwrap();

        let report = net.node(0).pool.deliver_pooling(now_ms(), None).await.unwrap();
        assert_eq!(report.delivered, 1);

        for i in 1..3 {
            let (tx, _state) = net.node(i).store.tx_by_id_across_collections(&id).await.unwrap().expect("delivered on peer");
            assert_eq!(tx.id, id);
        }

        net.shutdown().await;
    }

    #[tokio::test]
    async fn syncblocked_catches_a_lagging_node_up_to_a_sealed_block() {
        let net = MeshTestnet::spawn(2).await;

        let req = NewTxRequest { tenant: None, tx_type: TxType::New, prev_id: None, data: serde_json::json!({}) };
        net.node(0).pool.ingress(Uuid::nil(), req, now_ms(), 1).await.unwrap();
        net.node(0).pool.deliver_pooling(now_ms(), None).await.unwrap();
        let sealed = net.node(0).pool.seal(now_ms()).await.unwrap();
        assert_eq!(sealed.height, 1);

        let lagging = net.node(1).store.last_block().await.unwrap();
        assert_eq!(lagging.height, 0);

        let outcome = net.node(1).pool.sync_blocked().await.unwrap();
        match outcome {
            SyncOutcome::CaughtUp { appended } => assert_eq!(appended, 1),
            other => panic!("expected CaughtUp, got {other:?}")
        }

        let caught_up = net.node(1).store.last_block().await.unwrap();
        assert_eq!(caught_up.height, 1);
        assert_eq!(caught_up.hash, sealed.hash);

        net.shutdown().await;
    }

    #[tokio::test]
    async fn syncblocked_is_a_no_op_when_every_peer_is_at_the_same_height() {
        let net = MeshTestnet::spawn(2).await;

        let outcome = net.node(0).pool.sync_blocked().await.unwrap();
        assert!(matches!(outcome, SyncOutcome::UpToDate));

        net.shutdown().await;
    }

    #[tokio::test]
    async fn repeated_delivery_round_does_not_duplicate_the_peer_copy() {
        let net = MeshTestnet::spawn(2).await;

        let req = NewTxRequest { tenant: None, tx_type: TxType::New, prev_id: None, data: serde_json::json!({}) };
        net.node(0).pool.ingress(Uuid::nil(), req, now_ms(), 1).await.unwrap();

        let first = net.node(0).pool.deliver_pooling(now_ms(), None).await.unwrap();
        assert_eq!(first.delivered, 1);
        let second = net.node(0).pool.deliver_pooling(now_ms(), None).await.unwrap();
        assert_eq!(second.delivered, 0);

        let delivered = net.node(1).store.list_delivered(None, true).await.unwrap();
        assert_eq!(delivered.len(), 1);

        net.shutdown().await;
    }
}
