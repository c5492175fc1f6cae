use std::sync::{atomic::AtomicU32, Arc};

use meshchain_config::{ApiConfig, AuthScheme};
use meshchain_metrics::MeshMetrics;
use meshchain_pool::PoolEngine;
use meshchain_store::DataStore;
use meshchain_tenant::TenantRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Bearer tokens minted by `POST /login`, mapped back to the username that
/// obtained them. Held per-listener: a user-API token never authorizes an
/// admin-API call and vice versa, since each listener owns its own
/// [`AppState`].
#[derive(Default)]
pub struct TokenStore(Mutex<HashMap<String, String>>);

impl TokenStore {
    pub fn issue(&self, username: &str) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.0.lock().insert(token.clone(), username.to_string());
        token
    }

    pub fn username_for(&self, token: &str) -> Option<String> {
        self.0.lock().get(token).cloned()
    }
}

/// Per-listener shared state: one instance for the User API, one for the
/// Admin API, differing only in `credentials`/`auth_scheme` and sharing the
/// same pool engine, store, and tenant registry underneath.
#[derive(Clone)]
pub struct AppState {
    pub store:          Arc<dyn DataStore>,
    pub pool:           PoolEngine,
    pub tenants:        Arc<TenantRegistry>,
    pub tokens:         Arc<TokenStore>,
    pub metrics:        MeshMetrics,
    pub node_identity:  String,
    pub auth_scheme:    AuthScheme,
    pub credentials:    (String, String),
    pub id_counter:     Arc<AtomicU32>
}

impl AppState {
    pub fn new(
        store: Arc<dyn DataStore>,
        pool: PoolEngine,
        tenants: Arc<TenantRegistry>,
        metrics: MeshMetrics,
        node_identity: String,
        api: &ApiConfig
    ) -> Self {
        Self {
            store,
            pool,
            tenants,
            tokens: Arc::new(TokenStore::default()),
            metrics,
            node_identity,
            auth_scheme: api.auth_scheme,
            credentials: (api.credentials.username.clone(), api.credentials.password.clone()),
            id_counter: Arc::new(AtomicU32::new(0))
        }
    }

    pub fn next_id_counter(&self) -> u32 {
        self.id_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
