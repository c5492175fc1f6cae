pub mod admin;
pub mod user;

use meshchain_types::{mesh_err, ErrorKind};

use crate::error::ApiError;

const COMPONENT: &str = "meshchain-api";

/// Validates a path id as 24-hex before it ever reaches the store: a
/// malformed id returns `404` without hitting the store at all.
pub(crate) fn require_valid_id(id: &str) -> Result<(), ApiError> {
    if meshchain_types::id::is_valid_object_id(id) {
        Ok(())
    } else {
        Err(ApiError(mesh_err!(ErrorKind::NotFound, COMPONENT, "require_valid_id", "malformed id {id}")))
    }
}
