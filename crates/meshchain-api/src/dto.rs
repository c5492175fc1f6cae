//! Request/response bodies for the HTTP surfaces. Fields use
//! `camelCase` on the wire to match `Tx`/`Block`/`Tenant`'s own convention.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user:     String,
    pub password: String
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String
}

/// Carried by every `/get/*` call; `tenant` is optional and falls back to
/// the reserved default tenant.
#[derive(Debug, Deserialize, Default)]
pub struct TenantScope {
    pub tenant: Option<Uuid>
}

#[derive(Debug, Deserialize)]
pub struct ByJsonQuery {
    pub tenant: Option<Uuid>,
    pub key:    String,
    pub value:  serde_json::Value
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitBcRequest {
    #[serde(default)]
    pub trytoreset: bool
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTenantRequest {
    pub admin_id:      Uuid,
    pub recall_phrase: String
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTenantResponse {
    pub tenant_id: Uuid
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTenantRequest {
    pub admin_id:  Uuid,
    pub tenant_id: Uuid
}
