use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of mutation a [`Tx`] represents against its `prev_id` history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    New,
    Update,
    Delete
}

impl TxType {
    /// `new` is the only variant allowed to omit `prev_id`.
    pub fn requires_prev_id(self) -> bool {
        !matches!(self, TxType::New)
    }
}

/// A tenant-scoped transaction. `prev_id` must point at a Tx visible to
/// the same tenant for every non-`new` type, and the transitive `prev_id`
/// chain must be acyclic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tx {
    pub id:         String,
    pub tenant:     Uuid,
    #[serde(rename = "type")]
    pub tx_type:    TxType,
    pub prev_id:    Option<String>,
    pub data:       serde_json::Value,
    pub created_at: u64
}

/// The shape of a transaction as submitted by a caller, before the store
/// assigns an `id` and resolves the tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTxRequest {
    pub tenant:  Option<Uuid>,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub prev_id: Option<String>,
    pub data:    serde_json::Value
}

/// Where a Tx currently lives. Not a stored field — it is inferred by
/// which collection holds the Tx — but it is useful to carry
/// around in memory once a caller has looked a Tx up across collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    Pooled,
    Delivered,
    Blocked
}
