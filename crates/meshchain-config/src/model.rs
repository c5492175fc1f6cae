//! The typed configuration snapshot (component C9's shape). `MeshConfig` is
//! what the rest of the node reads; `RawConfig` is only the TOML
//! deserialization target, kept private to this crate so no downstream
//! crate can accidentally observe a still-encrypted password field.

use std::{collections::HashMap, net::SocketAddr, path::PathBuf, time::Duration};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    Basic,
    Bearer
}

#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub auth_scheme: AuthScheme,
    pub credentials: ApiCredentials
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub endpoint: String,
    pub database: String,
    pub username: String,
    pub password: String
}

#[derive(Debug, Clone)]
pub enum LoggingSink {
    Stdout,
    File { path: PathBuf },
    Both { path: PathBuf }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub sink: LoggingSink,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"meshchain=info"`.
    pub directive: String
}

/// The complete, decrypted, env-overridden configuration for one node
/// process. Constructed only via [`crate::loader::load`].
#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub node_identity: String,
    pub key_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub peers: HashMap<String, SocketAddr>,
    /// Every other cluster member's Ed25519 verifying key, hex-encoded and
    /// keyed by the same node identity used in `peers` — lets
    /// `scan_and_fix_block` authenticate a block sealed by any peer.
    pub peer_keys: HashMap<String, String>,
    pub store: StoreConfig,
    pub user_api: ApiConfig,
    pub admin_api: ApiConfig,
    pub logging: LoggingConfig,
    pub password_encryption: bool,
    pub max_payload_bytes: usize,
    pub seal_interval: Duration,
    pub delivery_interval: Duration,
    pub scan_interval: Duration
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawConfig {
    pub node_identity: String,
    pub key_path: PathBuf,
    pub listen_addr: SocketAddr,
    #[serde(default)]
    pub peers: HashMap<String, SocketAddr>,
    #[serde(default)]
    pub peer_keys: HashMap<String, String>,
    pub password_encryption: bool,
    pub store: RawStore,
    pub user_api: RawApi,
    pub admin_api: RawApi,
    pub logging: RawLogging,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    #[serde(default = "default_seal_interval", with = "humantime_serde")]
    pub seal_interval: Duration,
    #[serde(default = "default_delivery_interval", with = "humantime_serde")]
    pub delivery_interval: Duration,
    #[serde(default = "default_scan_interval", with = "humantime_serde")]
    pub scan_interval: Duration
}

fn default_max_payload_bytes() -> usize {
    256 * 1024
}

fn default_seal_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_delivery_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_scan_interval() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawStore {
    pub endpoint: String,
    pub database: String,
    pub username: String,
    pub password: String
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawApi {
    pub port: u16,
    pub auth_scheme: AuthScheme,
    pub username: String,
    pub password: String
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawLogging {
    pub kind: RawLoggingKind,
    pub path: Option<PathBuf>,
    #[serde(default = "default_directive")]
    pub directive: String
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RawLoggingKind {
    Stdout,
    File,
    Both
}

fn default_directive() -> String {
    "meshchain=info".to_string()
}
