//! The API edge (component C7): two authenticated HTTP surfaces — User and
//! Admin — built on `axum` + `tower-http`, with `tracing::instrument` /
//! `EnvFilter`-driven logging throughout.

mod auth;
mod dto;
mod error;
mod routes;
mod state;
#[cfg(test)]
mod tests;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    middleware,
    routing::{get, post},
    Router
};
use meshchain_config::ApiConfig;
use meshchain_metrics::MeshMetrics;
use meshchain_pool::PoolEngine;
use meshchain_store::DataStore;
use meshchain_tenant::TenantRegistry;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub use state::AppState;

/// Builds the User API router: tenant-scoped reads and writes.
pub fn user_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/post/byjson", post(routes::user::post_byjson))
        .route("/get/byjson", get(routes::user::get_byjson))
        .route("/get/byoid/:id", get(routes::user::get_byoid))
        .route("/get/pooling", get(routes::user::get_pooling))
        .route("/get/poolingdelivered", get(routes::user::get_pooling_delivered))
        .route("/get/blocked", get(routes::user::get_blocked))
        .route("/get/alltxs", get(routes::user::get_alltxs))
        .route("/get/history/:id", get(routes::user::get_history))
        .route("/get/totalnumber", get(routes::user::get_totalnumber))
        .route("/get/lastblock", get(routes::user::get_lastblock))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/login", post(routes::user::login))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CatchPanicLayer::new())
}

/// Builds the Admin API router: system control and tenant lifecycle.
/// `/sys/*` always authenticates against this listener's own credentials,
/// which are configured separately from the User API's.
pub fn admin_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/sys/initbc", post(routes::admin::initbc))
        .route("/sys/deliverpooling", post(routes::admin::deliverpooling))
        .route("/sys/blocking", post(routes::admin::blocking))
        .route("/sys/syncblocked", post(routes::admin::syncblocked))
        .route("/sys/opentenant", post(routes::admin::opentenant))
        .route("/sys/closetenant", post(routes::admin::closetenant))
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/login", post(routes::admin::login))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CatchPanicLayer::new())
}

/// Convenience constructor used by `meshchain-node`'s boot sequence: builds
/// both listeners' [`AppState`] from one set of shared collaborators plus
/// the two [`ApiConfig`]s.
pub fn build_states(
    store: Arc<dyn DataStore>,
    pool: PoolEngine,
    tenants: Arc<TenantRegistry>,
    metrics: MeshMetrics,
    node_identity: String,
    user_api: &ApiConfig,
    admin_api: &ApiConfig
) -> (AppState, AppState) {
    let user_state = AppState::new(store.clone(), pool.clone(), tenants.clone(), metrics.clone(), node_identity.clone(), user_api);
    let admin_state = AppState::new(store, pool, tenants, metrics, node_identity, admin_api);
    (user_state, admin_state)
}

/// Binds and serves one router on `addr` until `shutdown` fires. Used once
/// per listener by `meshchain-node`'s boot sequence.
pub async fn serve(addr: SocketAddr, router: Router, mut shutdown: tokio::sync::watch::Receiver<bool>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}
