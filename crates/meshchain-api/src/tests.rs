use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode}
};
use meshchain_config::{ApiConfig, ApiCredentials, AuthScheme};
use meshchain_keyring::Keyring;
use meshchain_metrics::MeshMetrics;
use meshchain_pool::{PeerHead, PeerLink, PoolConfig, PoolEngine};
use meshchain_store::{DataStore, InMemoryStore};
use meshchain_tenant::TenantRegistry;
use meshchain_types::{Block, MeshResult, Tx};
use serde_json::json;
use tower::ServiceExt;

use crate::{admin_router, state::AppState, user_router};

struct NoPeers;

#[async_trait]
impl PeerLink for NoPeers {
    fn known_peers(&self) -> Vec<String> {
        Vec::new()
    }

    async fn deliver_tx(&self, _peer: &str, _tx: &Tx) -> MeshResult<()> {
        Ok(())
    }

    async fn peer_head(&self, _peer: &str) -> MeshResult<PeerHead> {
        unimplemented!("no peers configured in this harness")
    }

    async fn fetch_blocks_from(&self, _peer: &str, _from_height: u64) -> MeshResult<Vec<Block>> {
        Ok(Vec::new())
    }
}

fn api_config(auth_scheme: AuthScheme) -> ApiConfig {
    ApiConfig {
        port: 0,
        auth_scheme,
        credentials: ApiCredentials { username: "alice".into(), password: "hunter2".into() }
    }
}

fn test_state(auth_scheme: AuthScheme) -> AppState {
    let genesis = Block::genesis("node-a", 0);
    let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::new(genesis));
    let keyring = Arc::new(Keyring::generate("node-a"));
    let peer_link: Arc<dyn PeerLink> = Arc::new(NoPeers);
    let metrics = MeshMetrics;
    let pool = PoolEngine::new(store.clone(), keyring, peer_link, PoolConfig::default(), std::collections::HashMap::new(), metrics);
    let tenants = Arc::new(TenantRegistry::new());
    AppState::new(store, pool, tenants, metrics, "node-a".into(), &api_config(auth_scheme))
}

fn basic_auth_header(user: &str, password: &str) -> String {
    use base64::Engine;
    format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}")))
}

fn json_request(method: &str, uri: &str, body: serde_json::Value, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn protected_route_without_auth_header_is_rejected() {
    let router = user_router(test_state(AuthScheme::Bearer));
    let request = json_request("GET", "/get/alltxs", json!({}), None);
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn basic_auth_with_wrong_password_is_rejected() {
    let router = user_router(test_state(AuthScheme::Basic));
    let header_value = basic_auth_header("alice", "wrong");
    let request = json_request("GET", "/get/alltxs", json!({}), Some(&header_value));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn basic_auth_with_correct_credentials_is_accepted() {
    let router = user_router(test_state(AuthScheme::Basic));
    let header_value = basic_auth_header("alice", "hunter2");
    let request = json_request("GET", "/get/alltxs", json!({}), Some(&header_value));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_then_bearer_token_round_trips() {
    let router = user_router(test_state(AuthScheme::Bearer));
    let login = router.clone().oneshot(json_request(
        "POST",
        "/login",
        json!({ "user": "alice", "password": "hunter2" }),
        None
    ));
    let login_response = login.await.unwrap();
    assert_eq!(login_response.status(), StatusCode::OK);
    let body = body_json(login_response).await;
    let token = body["token"].as_str().unwrap().to_string();

    let bearer = format!("Bearer {token}");
    let request = json_request("GET", "/get/alltxs", json!({}), Some(&bearer));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_object_id_is_not_found() {
    let router = user_router(test_state(AuthScheme::Basic));
    let header_value = basic_auth_header("alice", "hunter2");
    let request = json_request("GET", "/get/byoid/not-an-id", json!({}), Some(&header_value));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_tenant_is_service_unavailable() {
    let router = user_router(test_state(AuthScheme::Basic));
    let header_value = basic_auth_header("alice", "hunter2");
    let request = json_request(
        "GET",
        "/get/pooling",
        json!({ "tenant": uuid::Uuid::new_v4() }),
        Some(&header_value)
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn oversize_payload_is_rejected_with_413() {
    let router = user_router(test_state(AuthScheme::Basic));
    let header_value = basic_auth_header("alice", "hunter2");
    let oversized = "x".repeat(300 * 1024);
    let request = json_request(
        "POST",
        "/post/byjson",
        json!({ "type": "new", "data": { "blob": oversized } }),
        Some(&header_value)
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn post_then_get_byoid_round_trips_through_the_user_api() {
    let state = test_state(AuthScheme::Basic);
    let router = user_router(state);
    let header_value = basic_auth_header("alice", "hunter2");

    let post_request = json_request(
        "POST",
        "/post/byjson",
        json!({ "type": "new", "data": { "hello": "world" } }),
        Some(&header_value)
    );
    let post_response = router.clone().oneshot(post_request).await.unwrap();
    assert_eq!(post_response.status(), StatusCode::OK);
    let id = body_json(post_response).await.as_str().unwrap().to_string();

    let get_request = json_request("GET", &format!("/get/byoid/{id}"), json!({}), Some(&header_value));
    let get_response = router.oneshot(get_request).await.unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
    let body = body_json(get_response).await;
    assert_eq!(body["id"], id);
    assert_eq!(body["data"]["hello"], "world");
}

#[tokio::test]
async fn admin_blocking_seals_a_block_after_a_pooled_tx() {
    let state = test_state(AuthScheme::Basic);
    let user = user_router(state.clone());
    let admin = admin_router(state);
    let header_value = basic_auth_header("alice", "hunter2");

    let post_request = json_request(
        "POST",
        "/post/byjson",
        json!({ "type": "new", "data": {} }),
        Some(&header_value)
    );
    assert_eq!(user.oneshot(post_request).await.unwrap().status(), StatusCode::OK);

    let seal_request = json_request("POST", "/sys/blocking", json!({}), Some(&header_value));
    let seal_response = admin.oneshot(seal_request).await.unwrap();
    assert_eq!(seal_response.status(), StatusCode::OK);
    let block = body_json(seal_response).await;
    assert_eq!(block["height"], 1);
}
