//! The domain calls carried inside a [`meshchain_types::Packet`]'s
//! `Request.body` / `ResultSuccess.data` strings. The outer frame is
//! length-delimited bincode of the whole `Packet`; the body itself is a
//! small JSON envelope so a packet capture is still human-readable without
//! a bincode schema in hand.

use meshchain_types::{Block, Hash32, Tx};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireCall {
    DeliverTx { tx: Tx },
    HeadQuery,
    FetchBlocks { from_height: u64 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireReply {
    Ack,
    Head { height: u64, hash: Hash32 },
    Blocks { blocks: Vec<Block> }
}

pub fn encode_call(call: &WireCall) -> String {
    serde_json::to_string(call).expect("WireCall serializes")
}

pub fn decode_call(body: &str) -> Result<WireCall, serde_json::Error> {
    serde_json::from_str(body)
}

pub fn encode_reply(reply: &WireReply) -> String {
    serde_json::to_string(reply).expect("WireReply serializes")
}

pub fn decode_reply(data: &str) -> Result<WireReply, serde_json::Error> {
    serde_json::from_str(data)
}
