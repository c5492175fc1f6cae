//! User API handlers: tenant-scoped reads and
//! writes over Tx/Block data.

use axum::{
    extract::{Path, State},
    Json
};
use meshchain_types::{mesh_err, ErrorKind, NewTxRequest, Tx};

use super::require_valid_id;
use crate::{
    dto::{ByJsonQuery, LoginRequest, LoginResponse, TenantScope},
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

pub async fn post_byjson(State(state): State<AppState>, Json(req): Json<NewTxRequest>) -> ApiResult<Json<String>> {
    let tenant = state.tenants.resolve_open(req.tenant)?;
    let id = state.pool.ingress(tenant, req, now_ms(), state.next_id_counter()).await?;
    Ok(Json(id))
}

pub async fn get_byjson(State(state): State<AppState>, Json(query): Json<ByJsonQuery>) -> ApiResult<Json<Vec<Tx>>> {
    let tenant = state.tenants.resolve_open(query.tenant)?;
    let mut matches = Vec::new();
    for tx in gather_all(&state, tenant).await? {
        if tx.data.get(&query.key) == Some(&query.value) {
            matches.push(tx);
        }
    }
    Ok(Json(matches))
}

pub async fn get_byoid(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(scope): Json<TenantScope>
) -> ApiResult<Json<serde_json::Value>> {
    require_valid_id(&id)?;
    let tenant = state.tenants.resolve_open(scope.tenant)?;

    match state.store.tx_by_id_across_collections(&id).await? {
        Some((tx, _)) if tx.tenant == tenant => Ok(Json(serde_json::to_value(tx).expect("Tx always serializes"))),
        _ => Ok(Json(serde_json::json!({})))
    }
}

pub async fn get_pooling(State(state): State<AppState>, Json(scope): Json<TenantScope>) -> ApiResult<Json<Vec<Tx>>> {
    let tenant = state.tenants.resolve_open(scope.tenant)?;
    Ok(Json(state.store.list_pool(Some(tenant), false).await?))
}

pub async fn get_pooling_delivered(State(state): State<AppState>, Json(scope): Json<TenantScope>) -> ApiResult<Json<Vec<Tx>>> {
    let tenant = state.tenants.resolve_open(scope.tenant)?;
    Ok(Json(state.store.list_delivered(Some(tenant), false).await?))
}

pub async fn get_blocked(State(state): State<AppState>, Json(scope): Json<TenantScope>) -> ApiResult<Json<Vec<Tx>>> {
    let tenant = state.tenants.resolve_open(scope.tenant)?;
    Ok(Json(state.store.list_blocked(Some(tenant), false).await?))
}

pub async fn get_alltxs(State(state): State<AppState>, Json(scope): Json<TenantScope>) -> ApiResult<Json<Vec<Tx>>> {
    let tenant = state.tenants.resolve_open(scope.tenant)?;
    Ok(Json(gather_all(&state, tenant).await?))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(scope): Json<TenantScope>
) -> ApiResult<Json<Vec<Tx>>> {
    require_valid_id(&id)?;
    let tenant = state.tenants.resolve_open(scope.tenant)?;

    let chain = state.pool.history(&id).await?;
    match chain.last() {
        Some(terminal) if terminal.tenant == tenant => Ok(Json(chain)),
        _ => Err(mesh_err!(ErrorKind::NotFound, COMPONENT, "get_history", "tx {id} not found for tenant").into())
    }
}

pub async fn get_totalnumber(State(state): State<AppState>, Json(scope): Json<TenantScope>) -> ApiResult<Json<usize>> {
    let tenant = state.tenants.resolve_open(scope.tenant)?;
    Ok(Json(gather_all(&state, tenant).await?.len()))
}

pub async fn get_lastblock(
    State(state): State<AppState>,
    Json(scope): Json<TenantScope>
) -> ApiResult<Json<meshchain_types::Block>> {
    state.tenants.resolve_open(scope.tenant)?;
    Ok(Json(state.store.last_block().await?))
}

async fn gather_all(state: &AppState, tenant: uuid::Uuid) -> ApiResult<Vec<Tx>> {
    let mut all = state.store.list_pool(Some(tenant), false).await?;
    all.extend(state.store.list_delivered(Some(tenant), false).await?);
    all.extend(state.store.list_blocked(Some(tenant), false).await?);
    Ok(all)
}
