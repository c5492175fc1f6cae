use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The current wire version. A peer sending any other value is rejected with
/// `IncompatiblePeer`.
pub const PACKET_VERSION: u8 = 1;

/// The single message type carried over the bidirectional peer RPC stream
///. Exactly one reply with `prev_id == req.packet_id` is
/// expected per delivered request; duplicates are discarded by the
/// correlation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub version:   u8,
    pub packet_id: Uuid,
    pub sender:    String,
    pub receiver:  String,
    /// The `packet_id` of the request this packet answers. Empty (`None`)
    /// for fresh requests.
    pub prev_id:   Option<Uuid>,
    pub payload:   Payload
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    Request { body: String },
    ResultSuccess { data: String },
    ResultFailure { error: String }
}

impl Packet {
    pub fn new_request(sender: &str, receiver: &str, body: String) -> Self {
        Packet {
            version: PACKET_VERSION,
            packet_id: Uuid::new_v4(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            prev_id: None,
            payload: Payload::Request { body }
        }
    }

    pub fn reply_success(&self, sender: &str, data: String) -> Self {
        Packet {
            version: PACKET_VERSION,
            packet_id: Uuid::new_v4(),
            sender: sender.to_string(),
            receiver: self.sender.clone(),
            prev_id: Some(self.packet_id),
            payload: Payload::ResultSuccess { data }
        }
    }

    pub fn reply_failure(&self, sender: &str, error: String) -> Self {
        Packet {
            version: PACKET_VERSION,
            packet_id: Uuid::new_v4(),
            sender: sender.to_string(),
            receiver: self.sender.clone(),
            prev_id: Some(self.packet_id),
            payload: Payload::ResultFailure { error }
        }
    }

    pub fn is_reply_to(&self, request_id: Uuid) -> bool {
        self.prev_id == Some(request_id)
    }
}
