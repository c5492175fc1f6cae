//! Inter-node RPC (component C5): a bidirectional streaming `Packet`
//! transport per peer, with at-most-one in-flight-per-packet correlation
//! and exponential-backoff reconnect. Exposes [`NetworkHandle`], which
//! implements `meshchain_pool::PeerLink` for the pool & block engine to
//! call out through.

pub mod backoff;
pub mod connection;
pub mod inflight;
pub mod listener;
pub mod manager;
pub mod wire;

pub use backoff::{PeerBackoff, PeerConnState};
pub use manager::{NetworkConfig, NetworkHandle};

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

    use async_trait::async_trait;
    use meshchain_pool::{InboundHandler, PeerHead, PeerLink};
    use meshchain_types::{Block, Hash32, MeshResult, Tx};

    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl InboundHandler for EchoHandler {
        async fn on_deliver_tx(&self, _tx: Tx) -> MeshResult<()> {
            Ok(())
        }

        async fn on_head_query(&self) -> MeshResult<PeerHead> {
            Ok(PeerHead { height: 3, hash: Hash32([9u8; 32]) })
        }

        async fn on_fetch_blocks(&self, _from_height: u64) -> MeshResult<Vec<Block>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn head_query_round_trips_over_a_real_tcp_socket() {
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        drop(listener);

        let server_inbound: Arc<dyn InboundHandler> = Arc::new(EchoHandler);
        let server_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            listener::run(addr, "server".into(), server_inbound, server_shutdown).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut peers = HashMap::new();
        peers.insert("server".to_string(), addr);
        let client_inbound: Arc<dyn InboundHandler> = Arc::new(EchoHandler);
        let client = NetworkHandle::new(
            NetworkConfig { node_identity: "client".into(), peers, request_timeout: Duration::from_secs(2) },
            client_inbound,
            shutdown_rx
        );

        let head = client.peer_head("server").await.unwrap();
        assert_eq!(head.height, 3);

        let _ = shutdown_tx.send(true);
    }
}
