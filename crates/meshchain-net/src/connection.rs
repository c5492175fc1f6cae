//! One bidirectional peer stream: a reader loop that dispatches inbound
//! Requests to handler tasks and resolves inflight waiters from inbound
//! Replies, and a writer loop draining an outbound queue shared by the
//! manager's own requests and by reply-writing handler tasks: one reader
//! task and one writer task per peer stream, plus handler tasks per
//! inbound Request.

use std::{collections::HashSet, sync::Arc};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use meshchain_types::{Packet, Payload, PACKET_VERSION};
use tokio::{net::TcpStream, sync::mpsc, sync::watch};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::{inflight::InflightMap, wire};
use meshchain_pool::InboundHandler;

/// A handle to a running connection task: a channel to enqueue outbound
/// packets. Dropping it does not close the connection; the task exits when
/// the stream itself closes or `shutdown` fires.
#[derive(Clone)]
pub struct PeerConnection {
    outbound_tx: mpsc::UnboundedSender<Packet>
}

impl PeerConnection {
    pub fn spawn(
        stream: TcpStream,
        node_identity: String,
        peer_identity: String,
        inbound: Arc<dyn InboundHandler>,
        inflight: Arc<InflightMap>,
        shutdown: watch::Receiver<bool>
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let reply_tx = outbound_tx.clone();
        tokio::spawn(run(stream, node_identity, peer_identity, inbound, inflight, outbound_rx, reply_tx, shutdown));
        Self { outbound_tx }
    }

    pub fn send(&self, packet: Packet) -> Result<(), mpsc::error::SendError<Packet>> {
        self.outbound_tx.send(packet)
    }
}

async fn run(
    stream: TcpStream,
    node_identity: String,
    peer_identity: String,
    inbound: Arc<dyn InboundHandler>,
    inflight: Arc<InflightMap>,
    mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
    reply_tx: mpsc::UnboundedSender<Packet>,
    mut shutdown: watch::Receiver<bool>
) {
    let (read_half, write_half) = stream.into_split();
    let mut framed_read = FramedRead::new(read_half, LengthDelimitedCodec::new());
    let mut framed_write = FramedWrite::new(write_half, LengthDelimitedCodec::new());
    let mut seen: HashSet<uuid::Uuid> = HashSet::new();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            frame = framed_read.next() => {
                match frame {
                    Some(Ok(bytes)) => {
                        match bincode::deserialize::<Packet>(&bytes) {
                            Ok(packet) => handle_inbound(packet, &node_identity, &inbound, &inflight, &reply_tx, &mut seen),
                            Err(error) => tracing::warn!(peer = %peer_identity, %error, "dropping malformed frame")
                        }
                    }
                    Some(Err(error)) => {
                        tracing::warn!(peer = %peer_identity, %error, "peer stream read error");
                        break;
                    }
                    None => break
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(packet) => {
                        let bytes = match bincode::serialize(&packet) {
                            Ok(bytes) => bytes,
                            Err(error) => {
                                tracing::error!(peer = %peer_identity, %error, "failed to encode outbound packet");
                                continue;
                            }
                        };
                        if framed_write.send(Bytes::from(bytes)).await.is_err() {
                            break;
                        }
                    }
                    None => break
                }
            }
        }
    }

    inflight.cancel_all();
    tracing::info!(peer = %peer_identity, "peer stream closed");
}

fn handle_inbound(
    packet: Packet,
    node_identity: &str,
    inbound: &Arc<dyn InboundHandler>,
    inflight: &Arc<InflightMap>,
    reply_tx: &mpsc::UnboundedSender<Packet>,
    seen: &mut HashSet<uuid::Uuid>
) {
    if packet.version != PACKET_VERSION {
        let _ = reply_tx.send(packet.reply_failure(node_identity, "IncompatiblePeer".into()));
        return;
    }

    if !seen.insert(packet.packet_id) {
        tracing::debug!(packet_id = %packet.packet_id, "duplicate packet_id dropped");
        return;
    }
    if seen.len() > 4096 {
        seen.clear();
    }

    match packet.payload {
        Payload::Request { ref body } => {
            let call = wire::decode_call(body);
            let inbound = inbound.clone();
            let node_identity = node_identity.to_string();
            let reply_tx = reply_tx.clone();
            let packet_for_reply = packet.clone();
            tokio::spawn(async move {
                let outcome = match call {
                    Ok(call) => dispatch(&inbound, call).await,
                    Err(error) => Err(error.to_string())
                };
                let reply = match outcome {
                    Ok(data) => packet_for_reply.reply_success(&node_identity, data),
                    Err(error) => packet_for_reply.reply_failure(&node_identity, error)
                };
                let _ = reply_tx.send(reply);
            });
        }
        Payload::ResultSuccess { .. } | Payload::ResultFailure { .. } => {
            if let Some(prev_id) = packet.prev_id {
                inflight.resolve(prev_id, packet.payload);
            } else {
                tracing::debug!(packet_id = %packet.packet_id, "reply with no prev_id dropped");
            }
        }
    }
}

async fn dispatch(inbound: &Arc<dyn InboundHandler>, call: wire::WireCall) -> Result<String, String> {
    let reply = match call {
        wire::WireCall::DeliverTx { tx } => inbound.on_deliver_tx(tx).await.map(|()| wire::WireReply::Ack),
        wire::WireCall::HeadQuery => inbound
            .on_head_query()
            .await
            .map(|head| wire::WireReply::Head { height: head.height, hash: head.hash }),
        wire::WireCall::FetchBlocks { from_height } => {
            inbound.on_fetch_blocks(from_height).await.map(|blocks| wire::WireReply::Blocks { blocks })
        }
    };
    reply.map(|r| wire::encode_reply(&r)).map_err(|error| error.to_string())
}
