//! The accept loop for inbound peer connections: one dispatch task per
//! inbound stream. Inbound connections don't need to be addressed by
//! identity up front — they only ever carry Requests back to this node's
//! [`meshchain_pool::InboundHandler`]; outbound requests to that same peer
//! go out over this node's own dialed connection.

use std::{net::SocketAddr, sync::Arc};

use meshchain_pool::InboundHandler;
use tokio::{net::TcpListener, sync::watch};

use crate::{connection::PeerConnection, inflight::InflightMap};

pub async fn run(
    addr: SocketAddr,
    node_identity: String,
    inbound: Arc<dyn InboundHandler>,
    shutdown: watch::Receiver<bool>
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "peer listener bound");
    let mut shutdown_rx = shutdown.clone();

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        tracing::debug!(%peer_addr, "accepted inbound peer connection");
                        let inflight = Arc::new(InflightMap::new());
                        PeerConnection::spawn(
                            stream,
                            node_identity.clone(),
                            peer_addr.to_string(),
                            inbound.clone(),
                            inflight,
                            shutdown.clone()
                        );
                    }
                    Err(error) => tracing::warn!(%error, "failed to accept inbound peer connection")
                }
            }
        }
    }

    Ok(())
}
