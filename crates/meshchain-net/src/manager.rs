//! The outbound side of component C5: dial-on-first-use per peer, request
//! correlation via [`InflightMap`], and the [`meshchain_pool::PeerLink`]
//! implementation the pool & block engine calls into.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::{Duration, Instant}};

use async_trait::async_trait;
use meshchain_metrics::MeshMetrics;
use meshchain_pool::{InboundHandler, PeerHead, PeerLink};
use meshchain_types::{mesh_err, Block, ErrorKind, MeshResult, Packet, Payload, Tx};
use parking_lot::Mutex;
use tokio::{net::TcpStream, sync::watch, sync::Mutex as AsyncMutex};

use crate::{
    backoff::PeerBackoff,
    connection::PeerConnection,
    inflight::InflightMap,
    listener,
    wire::{self, WireCall, WireReply}
};

const COMPONENT: &str = "meshchain-net";

pub struct NetworkConfig {
    pub node_identity:    String,
    pub peers:            HashMap<String, SocketAddr>,
    pub request_timeout:  Duration
}

struct PeerSlot {
    addr:    SocketAddr,
    conn:    AsyncMutex<Option<PeerConnection>>,
    backoff: Mutex<PeerBackoff>
}

struct Inner {
    node_identity:   String,
    slots:           HashMap<String, PeerSlot>,
    inflight:        Arc<InflightMap>,
    inbound:         Arc<dyn InboundHandler>,
    shutdown:        watch::Receiver<bool>,
    request_timeout: Duration,
    metrics:         MeshMetrics
}

/// `Arc`-wrapped handle, cheap to clone and share across the scheduler and
/// the orchestrator.
#[derive(Clone)]
pub struct NetworkHandle(Arc<Inner>);

impl NetworkHandle {
    pub fn new(config: NetworkConfig, inbound: Arc<dyn InboundHandler>, shutdown: watch::Receiver<bool>) -> Self {
        let slots = config
            .peers
            .into_iter()
            .map(|(id, addr)| (id, PeerSlot { addr, conn: AsyncMutex::new(None), backoff: Mutex::new(PeerBackoff::new()) }))
            .collect();

        Self(Arc::new(Inner {
            node_identity: config.node_identity,
            slots,
            inflight: Arc::new(InflightMap::new()),
            inbound,
            shutdown,
            request_timeout: config.request_timeout,
            metrics: MeshMetrics
        }))
    }

    /// Runs the accept loop for inbound peer streams until `shutdown` fires.
    pub async fn serve(&self, listen_addr: SocketAddr) -> std::io::Result<()> {
        listener::run(listen_addr, self.0.node_identity.clone(), self.0.inbound.clone(), self.0.shutdown.clone()).await
    }

    async fn ensure_connected(&self, peer: &str) -> MeshResult<PeerConnection> {
        let slot = self.0.slots.get(peer).ok_or_else(|| {
            mesh_err!(ErrorKind::PeerDisconnected, COMPONENT, "ensure_connected", "{peer} is not a configured peer")
        })?;

        let mut guard = slot.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        match TcpStream::connect(slot.addr).await {
            Ok(stream) => {
                let conn = PeerConnection::spawn(
                    stream,
                    self.0.node_identity.clone(),
                    peer.to_string(),
                    self.0.inbound.clone(),
                    self.0.inflight.clone(),
                    self.0.shutdown.clone()
                );
                slot.backoff.lock().mark_connected();
                *guard = Some(conn.clone());
                Ok(conn)
            }
            Err(error) => {
                let delay = slot.backoff.lock().mark_disconnected();
                tracing::debug!(peer, %error, reconnect_in = ?delay, "dial failed");
                Err(mesh_err!(ErrorKind::PeerDisconnected, COMPONENT, "ensure_connected", "dial {peer} at {}: {error}", slot.addr))
            }
        }
    }

    fn drop_connection(&self, peer: &str) {
        let Some(slot) = self.0.slots.get(peer) else { return };
        if let Ok(mut guard) = slot.conn.try_lock() {
            *guard = None;
        }
        slot.backoff.lock().mark_disconnected();
    }

    async fn request(&self, peer: &str, call: WireCall) -> MeshResult<WireReply> {
        let started = Instant::now();
        let result = self.request_inner(peer, call).await;
        self.0.metrics.record_rpc_round_trip(peer.to_string(), started.elapsed());
        result
    }

    async fn request_inner(&self, peer: &str, call: WireCall) -> MeshResult<WireReply> {
        let conn = self.ensure_connected(peer).await?;

        let packet = Packet::new_request(&self.0.node_identity, peer, wire::encode_call(&call));
        let packet_id = packet.packet_id;
        let rx = self.0.inflight.register(packet_id);

        if conn.send(packet).is_err() {
            self.0.inflight.cancel(packet_id);
            self.drop_connection(peer);
            return Err(mesh_err!(ErrorKind::PeerDisconnected, COMPONENT, "request", "peer {peer}'s write channel is closed"));
        }

        match tokio::time::timeout(self.0.request_timeout, rx).await {
            Ok(Ok(Payload::ResultSuccess { data })) => wire::decode_reply(&data).map_err(|error| {
                mesh_err!(ErrorKind::InternalError, COMPONENT, "request", "malformed reply from {peer}: {error}")
            }),
            Ok(Ok(Payload::ResultFailure { error })) => {
                Err(mesh_err!(ErrorKind::PeerDisconnected, COMPONENT, "request", "{peer} refused: {error}"))
            }
            Ok(Ok(Payload::Request { .. })) => Err(mesh_err!(
                ErrorKind::InternalError,
                COMPONENT,
                "request",
                "peer {peer} sent a request where a reply was expected"
            )),
            Ok(Err(_)) => {
                self.drop_connection(peer);
                Err(mesh_err!(ErrorKind::PeerDisconnected, COMPONENT, "request", "connection to {peer} dropped mid-request"))
            }
            Err(_) => {
                self.0.inflight.cancel(packet_id);
                Err(mesh_err!(
                    ErrorKind::PeerTimeout,
                    COMPONENT,
                    "request",
                    "{peer} did not reply within {:?}",
                    self.0.request_timeout
                ))
            }
        }
    }
}

#[async_trait]
impl PeerLink for NetworkHandle {
    fn known_peers(&self) -> Vec<String> {
        self.0.slots.keys().cloned().collect()
    }

    async fn deliver_tx(&self, peer: &str, tx: &Tx) -> MeshResult<()> {
        match self.request(peer, WireCall::DeliverTx { tx: tx.clone() }).await? {
            WireReply::Ack => Ok(()),
            other => Err(mesh_err!(ErrorKind::InternalError, COMPONENT, "deliver_tx", "unexpected reply {other:?} from {peer}"))
        }
    }

    async fn peer_head(&self, peer: &str) -> MeshResult<PeerHead> {
        match self.request(peer, WireCall::HeadQuery).await? {
            WireReply::Head { height, hash } => Ok(PeerHead { height, hash }),
            other => Err(mesh_err!(ErrorKind::InternalError, COMPONENT, "peer_head", "unexpected reply {other:?} from {peer}"))
        }
    }

    async fn fetch_blocks_from(&self, peer: &str, from_height: u64) -> MeshResult<Vec<Block>> {
        match self.request(peer, WireCall::FetchBlocks { from_height }).await? {
            WireReply::Blocks { blocks } => Ok(blocks),
            other => Err(mesh_err!(ErrorKind::InternalError, COMPONENT, "fetch_blocks_from", "unexpected reply {other:?} from {peer}"))
        }
    }
}
