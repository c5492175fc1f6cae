//! Admin API handlers: system control and
//! tenant lifecycle. `/sys/*` always authenticates with admin credentials —
//! enforced by this listener having its own [`crate::state::AppState`] built
//! from `admin_api`'s credentials, never the user API's.

use axum::{extract::State, Json};
use meshchain_types::{mesh_err, Block, ErrorKind};
use serde_json::json;

use crate::{
    dto::{CloseTenantRequest, InitBcRequest, LoginRequest, LoginResponse, OpenTenantRequest, OpenTenantResponse},
    error::ApiResult,
    state::{now_ms, AppState}
};

const COMPONENT: &str = "meshchain-api";

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<LoginResponse>> {
    if req.user == state.credentials.0 && req.password == state.credentials.1 {
        Ok(Json(LoginResponse { token: state.tokens.issue(&req.user) }))
    } else {
        Err(mesh_err!(ErrorKind::AuthError, COMPONENT, "login", "invalid credentials").into())
    }
}

pub async fn initbc(State(state): State<AppState>, Json(req): Json<InitBcRequest>) -> ApiResult<Json<Block>> {
    if req.trytoreset {
        // Cluster-uniform, like boot-time genesis: every node must land on
        // the same height-0 hash for `sync_blocked` to keep working after a
        // reset.
        let genesis = Block::genesis("", 0);
        state.store.reset(genesis.clone()).await?;
        Ok(Json(genesis))
    } else {
        Ok(Json(state.store.last_block().await?))
    }
}

pub async fn deliverpooling(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let report = state.pool.deliver_pooling(now_ms(), None).await?;
    Ok(Json(json!({ "delivered": report.delivered, "retained": report.retained })))
}

pub async fn blocking(State(state): State<AppState>) -> ApiResult<Json<Block>> {
    // chain-height/seal-duration metrics are recorded inside `seal` itself,
    // where the timer starts before the pool mutex is even acquired.
    let block = state.pool.seal(now_ms()).await?;
    Ok(Json(block))
}

pub async fn syncblocked(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    use meshchain_pool::SyncOutcome;
    let outcome = state.pool.sync_blocked().await?;
    let body = match outcome {
        SyncOutcome::UpToDate => json!({ "status": "upToDate" }),
        SyncOutcome::CaughtUp { appended } => json!({ "status": "caughtUp", "appended": appended }),
        SyncOutcome::Diverged { peer } => json!({ "status": "diverged", "peer": peer })
    };
    Ok(Json(body))
}

pub async fn opentenant(State(state): State<AppState>, Json(req): Json<OpenTenantRequest>) -> ApiResult<Json<OpenTenantResponse>> {
    let tenant_id = state.tenants.open_tenant(req.admin_id, req.recall_phrase);
    Ok(Json(OpenTenantResponse { tenant_id }))
}

pub async fn closetenant(State(state): State<AppState>, Json(req): Json<CloseTenantRequest>) -> ApiResult<Json<serde_json::Value>> {
    state.tenants.close_tenant(req.admin_id, req.tenant_id)?;
    Ok(Json(json!({ "tenantId": req.tenant_id })))
}
