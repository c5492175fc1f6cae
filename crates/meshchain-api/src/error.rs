//! Translates the internal [`meshchain_types::Error`] envelope to an HTTP
//! response. This is the one place in the node that turns an `ErrorKind`
//! into a status code; everywhere else speaks `ErrorKind`, never a raw
//! HTTP status.

use axum::{
    response::{IntoResponse, Response},
    Json
};
use meshchain_types::Error;
use serde_json::json;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.kind.http_status();
        if status >= 500 {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, "request rejected");
        }
        let body = json!({ "kind": self.0.kind.to_string(), "message": self.0.message });
        (axum::http::StatusCode::from_u16(status).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR), Json(body))
            .into_response()
    }
}
