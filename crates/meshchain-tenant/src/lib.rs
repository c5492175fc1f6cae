//! Tenant lifecycle and the authorization boundary enforced at the API edge
//! (component C10). Open/close tenants, and the single check every
//! `/post/*`/`/get/*` handler performs before touching the pool.

use std::collections::HashMap;

use meshchain_types::{mesh_err, Error, ErrorKind, MeshResult, Tenant, TenantState, DEFAULT_TENANT};
use parking_lot::RwLock;
use uuid::Uuid;

const COMPONENT: &str = "meshchain-tenant";

/// In-memory registry of tenants. A reserved default tenant (nil UUID) is
/// always present and open, so untagged traffic has somewhere to land.
pub struct TenantRegistry {
    tenants: RwLock<HashMap<Uuid, Tenant>>
}

impl TenantRegistry {
    pub fn new() -> Self {
        let mut tenants = HashMap::new();
        tenants.insert(
            DEFAULT_TENANT,
            Tenant {
                tenant_id: DEFAULT_TENANT,
                admin_id: Uuid::nil(),
                recall_phrase: String::new(),
                state: TenantState::Open
            }
        );
        Self { tenants: RwLock::new(tenants) }
    }

    /// Resolves an optional tenant argument to a concrete id, falling back
    /// to the default tenant when absent, and confirms it is open. This is
    /// the single check every `/post/*`/`/get/*` write or read performs
    /// before touching the pool.
    pub fn resolve_open(&self, tenant: Option<Uuid>) -> MeshResult<Uuid> {
        let tenant_id = tenant.unwrap_or(DEFAULT_TENANT);
        let tenants = self.tenants.read();
        match tenants.get(&tenant_id) {
            None => Err(mesh_err!(
                ErrorKind::TenantUnknown,
                COMPONENT,
                "resolve_open",
                "tenant {tenant_id} is not registered"
            )),
            Some(t) if !t.is_open() => Err(mesh_err!(
                ErrorKind::TenantClosed,
                COMPONENT,
                "resolve_open",
                "tenant {tenant_id} is closed"
            )),
            Some(_) => Ok(tenant_id)
        }
    }

    /// Resolves a tenant for administrative inspection, where a `closed`
    /// tenant is still readable — closed tenants still permit
    /// administrative inspection, just not new traffic.
    pub fn resolve_any(&self, tenant: Option<Uuid>) -> MeshResult<Uuid> {
        let tenant_id = tenant.unwrap_or(DEFAULT_TENANT);
        let tenants = self.tenants.read();
        if tenants.contains_key(&tenant_id) {
            Ok(tenant_id)
        } else {
            Err(mesh_err!(
                ErrorKind::TenantUnknown,
                COMPONENT,
                "resolve_any",
                "tenant {tenant_id} is not registered"
            ))
        }
    }

    pub fn open_tenant(&self, admin_id: Uuid, recall_phrase: String) -> Uuid {
        let tenant_id = Uuid::new_v4();
        let tenant =
            Tenant { tenant_id, admin_id, recall_phrase, state: TenantState::Open };
        self.tenants.write().insert(tenant_id, tenant);
        tenant_id
    }

    pub fn close_tenant(&self, admin_id: Uuid, tenant_id: Uuid) -> MeshResult<()> {
        let mut tenants = self.tenants.write();
        let tenant = tenants.get_mut(&tenant_id).ok_or_else(|| {
            mesh_err!(
                ErrorKind::TenantUnknown,
                COMPONENT,
                "close_tenant",
                "tenant {tenant_id} is not registered"
            )
        })?;

        if tenant.admin_id != admin_id {
            return Err(mesh_err!(
                ErrorKind::AuthError,
                COMPONENT,
                "close_tenant",
                "admin {admin_id} does not own tenant {tenant_id}"
            ));
        }

        tenant.state = TenantState::Closed;
        Ok(())
    }

    pub fn get(&self, tenant_id: Uuid) -> Option<Tenant> {
        self.tenants.read().get(&tenant_id).cloned()
    }
}

impl Default for TenantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tenant_is_open() {
        let registry = TenantRegistry::new();
        assert_eq!(registry.resolve_open(None).unwrap(), DEFAULT_TENANT);
    }

    #[test]
    fn unknown_tenant_is_rejected() {
        let registry = TenantRegistry::new();
        let err = registry.resolve_open(Some(Uuid::new_v4())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TenantUnknown);
    }

    #[test]
    fn open_then_close_round_trips() {
        let registry = TenantRegistry::new();
        let admin = Uuid::new_v4();
        let tenant_id = registry.open_tenant(admin, "apitest".into());
        assert_eq!(registry.resolve_open(Some(tenant_id)).unwrap(), tenant_id);

        registry.close_tenant(admin, tenant_id).unwrap();
        let err = registry.resolve_open(Some(tenant_id)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TenantClosed);

        // still inspectable
        assert_eq!(registry.resolve_any(Some(tenant_id)).unwrap(), tenant_id);
    }

    #[test]
    fn close_with_wrong_tenant_id_is_unknown() {
        let registry = TenantRegistry::new();
        let admin = Uuid::new_v4();
        let err = registry.close_tenant(admin, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TenantUnknown);
    }
}
