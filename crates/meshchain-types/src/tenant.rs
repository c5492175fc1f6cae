use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved tenant id that untagged traffic falls into.
pub const DEFAULT_TENANT: Uuid = Uuid::nil();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantState {
    Open,
    Closed
}

/// A logical partition of Txs. `open` tenants permit `/post/*` and
/// `/get/*`; `closed` tenants still permit administrative inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub tenant_id:     Uuid,
    pub admin_id:      Uuid,
    pub recall_phrase: String,
    pub state:         TenantState
}

impl Tenant {
    pub fn is_open(&self) -> bool {
        matches!(self.state, TenantState::Open)
    }
}
