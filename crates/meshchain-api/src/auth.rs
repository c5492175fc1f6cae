//! Basic or Bearer authentication, selected per listener by
//! [`meshchain_config::AuthScheme`]. Installed as an
//! `axum::middleware::from_fn_with_state` layer ahead of every route except
//! `/login` itself.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response
};
use base64::Engine;
use meshchain_config::AuthScheme;
use meshchain_types::{mesh_err, ErrorKind};

use crate::{error::ApiError, state::AppState};

const COMPONENT: &str = "meshchain-api";

pub async fn require_auth(State(state): State<AppState>, request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| mesh_err!(ErrorKind::AuthError, COMPONENT, "require_auth", "missing Authorization header"))?;

    let authorized = match state.auth_scheme {
        AuthScheme::Basic => check_basic(&state, header_value),
        AuthScheme::Bearer => check_bearer(&state, header_value)
    };

    if !authorized {
        return Err(ApiError(mesh_err!(ErrorKind::AuthError, COMPONENT, "require_auth", "invalid credentials")));
    }

    Ok(next.run(request).await)
}

fn check_basic(state: &AppState, header_value: &str) -> bool {
    let Some(encoded) = header_value.strip_prefix("Basic ") else { return false };
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else { return false };
    let Ok(decoded) = String::from_utf8(decoded) else { return false };
    let Some((user, password)) = decoded.split_once(':') else { return false };
    user == state.credentials.0 && password == state.credentials.1
}

fn check_bearer(state: &AppState, header_value: &str) -> bool {
    let Some(token) = header_value.strip_prefix("Bearer ") else { return false };
    state.tokens.username_for(token).is_some()
}
