//! Loads a [`MeshConfig`] from a TOML file, decrypts password fields when
//! `password_encryption = true`, then applies a small set of environment
//! overrides — a manual merge rather than a `figment`/`config`-crate layered
//! source, keeping the config surface out-of-tree and minimal.

use std::{collections::HashMap, net::SocketAddr, path::Path};

use crate::{
    cipher,
    model::{
        ApiConfig, ApiCredentials, LoggingConfig, LoggingSink, MeshConfig, RawApi, RawConfig, RawLogging, RawLoggingKind,
        RawStore, StoreConfig
    }
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: Box<toml::de::Error> },
    #[error("failed to read decryption key {path}: {source}")]
    KeyIo { path: String, source: std::io::Error },
    #[error("failed to decrypt password field {field}: {source}")]
    Decrypt { field: String, source: cipher::CipherError },
    #[error("environment override {var} could not be parsed: {reason}")]
    BadEnvOverride { var: String, reason: String },
    #[error("config field {field} is required: {reason}")]
    MissingField { field: String, reason: String }
}

/// Loads and fully resolves a node's configuration bundle.
///
/// `key_dir` is the directory holding `<env>.key` files referenced by
/// `password_encryption = true`; `env_name` picks which key file to read.
pub fn load(config_path: impl AsRef<Path>, key_dir: impl AsRef<Path>, env_name: &str) -> Result<MeshConfig, ConfigError> {
    let config_path = config_path.as_ref();
    let contents = std::fs::read_to_string(config_path)
        .map_err(|source| ConfigError::Io { path: config_path.display().to_string(), source })?;
    let raw: RawConfig = toml::from_str(&contents)
        .map_err(|source| ConfigError::Parse { path: config_path.display().to_string(), source: Box::new(source) })?;

    let key = if raw.password_encryption {
        let key_path = key_dir.as_ref().join(format!("{env_name}.key"));
        Some(std::fs::read(&key_path).map_err(|source| ConfigError::KeyIo { path: key_path.display().to_string(), source })?)
    } else {
        None
    };

    let resolve = |field: &str, value: &str| -> Result<String, ConfigError> {
        match &key {
            Some(k) => cipher::decrypt(value, k).map_err(|source| ConfigError::Decrypt { field: field.to_string(), source }),
            None => Ok(value.to_string())
        }
    };

    let mut config = MeshConfig {
        node_identity: raw.node_identity,
        key_path: raw.key_path,
        listen_addr: raw.listen_addr,
        peers: raw.peers,
        peer_keys: raw.peer_keys,
        password_encryption: raw.password_encryption,
        store: resolve_store(&raw.store, &resolve)?,
        user_api: resolve_api(&raw.user_api, "user_api.password", &resolve)?,
        admin_api: resolve_api(&raw.admin_api, "admin_api.password", &resolve)?,
        logging: resolve_logging(&raw.logging)?,
        max_payload_bytes: raw.max_payload_bytes,
        seal_interval: raw.seal_interval,
        delivery_interval: raw.delivery_interval,
        scan_interval: raw.scan_interval
    };

    apply_env_overrides(&mut config)?;
    Ok(config)
}

fn resolve_store(raw: &RawStore, resolve: &impl Fn(&str, &str) -> Result<String, ConfigError>) -> Result<StoreConfig, ConfigError> {
    Ok(StoreConfig {
        endpoint: raw.endpoint.clone(),
        database: raw.database.clone(),
        username: raw.username.clone(),
        password: resolve("store.password", &raw.password)?
    })
}

fn resolve_api(raw: &RawApi, field: &str, resolve: &impl Fn(&str, &str) -> Result<String, ConfigError>) -> Result<ApiConfig, ConfigError> {
    Ok(ApiConfig {
        port: raw.port,
        auth_scheme: raw.auth_scheme,
        credentials: ApiCredentials { username: raw.username.clone(), password: resolve(field, &raw.password)? }
    })
}

fn resolve_logging(raw: &RawLogging) -> Result<LoggingConfig, ConfigError> {
    let sink = match raw.kind {
        RawLoggingKind::Stdout => LoggingSink::Stdout,
        RawLoggingKind::File => LoggingSink::File {
            path: raw
                .path
                .clone()
                .ok_or_else(|| ConfigError::MissingField { field: "logging.path".to_string(), reason: "required for kind = \"file\"".to_string() })?
        },
        RawLoggingKind::Both => LoggingSink::Both {
            path: raw
                .path
                .clone()
                .ok_or_else(|| ConfigError::MissingField { field: "logging.path".to_string(), reason: "required for kind = \"both\"".to_string() })?
        }
    };
    Ok(LoggingConfig { sink, directive: raw.directive.clone() })
}

/// Overrides the handful of fields that should be configurable without
/// editing the TOML bundle: DB endpoint, peer list, the two API ports, and
/// the two API credential pairs.
fn apply_env_overrides(config: &mut MeshConfig) -> Result<(), ConfigError> {
    if let Ok(endpoint) = std::env::var("MESHCHAIN_STORE_ENDPOINT") {
        config.store.endpoint = endpoint;
    }
    if let Ok(port) = std::env::var("MESHCHAIN_USER_API_PORT") {
        config.user_api.port = parse_env("MESHCHAIN_USER_API_PORT", &port)?;
    }
    if let Ok(port) = std::env::var("MESHCHAIN_ADMIN_API_PORT") {
        config.admin_api.port = parse_env("MESHCHAIN_ADMIN_API_PORT", &port)?;
    }
    if let Ok(value) = std::env::var("MESHCHAIN_USER_API_CREDENTIALS") {
        config.user_api.credentials = parse_credentials("MESHCHAIN_USER_API_CREDENTIALS", &value)?;
    }
    if let Ok(value) = std::env::var("MESHCHAIN_ADMIN_API_CREDENTIALS") {
        config.admin_api.credentials = parse_credentials("MESHCHAIN_ADMIN_API_CREDENTIALS", &value)?;
    }
    if let Ok(value) = std::env::var("MESHCHAIN_PEERS") {
        config.peers = parse_peers("MESHCHAIN_PEERS", &value)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::BadEnvOverride { var: var.to_string(), reason: format!("`{value}` is not valid") })
}

fn parse_credentials(var: &str, value: &str) -> Result<ApiCredentials, ConfigError> {
    let (username, password) = value
        .split_once(':')
        .ok_or_else(|| ConfigError::BadEnvOverride { var: var.to_string(), reason: "expected `username:password`".to_string() })?;
    Ok(ApiCredentials { username: username.to_string(), password: password.to_string() })
}

fn parse_peers(var: &str, value: &str) -> Result<HashMap<String, SocketAddr>, ConfigError> {
    let mut peers = HashMap::new();
    if value.trim().is_empty() {
        return Ok(peers);
    }
    for entry in value.split(',') {
        let (name, addr) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::BadEnvOverride { var: var.to_string(), reason: format!("expected `name=host:port`, got `{entry}`") })?;
        let addr: SocketAddr =
            addr.parse().map_err(|_| ConfigError::BadEnvOverride { var: var.to_string(), reason: format!("`{addr}` is not a socket address") })?;
        peers.insert(name.to_string(), addr);
    }
    Ok(peers)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    const SAMPLE: &str = r#"
node_identity = "node-a"
key_path = "node-a.key"
listen_addr = "127.0.0.1:9000"
password_encryption = false

[peers]
node-b = "127.0.0.1:9001"

[store]
endpoint = "mongodb://localhost:27017"
database = "meshchain"
username = "svc"
password = "plain-db-pass"

[user_api]
port = 8080
auth_scheme = "basic"
username = "user"
password = "plain-user-pass"

[admin_api]
port = 8081
auth_scheme = "bearer"
username = "admin"
password = "plain-admin-pass"

[logging]
kind = "stdout"
"#;

    fn write_sample(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("node.toml");
        std::fs::File::create(&path).unwrap().write_all(SAMPLE.as_bytes()).unwrap();
        path
    }

    #[test]
    #[serial]
    fn loads_plaintext_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());
        let config = load(&path, dir.path(), "test").unwrap();
        assert_eq!(config.store.password, "plain-db-pass");
        assert_eq!(config.user_api.port, 8080);
        assert_eq!(config.peers.get("node-b").unwrap().port(), 9001);
    }

    #[test]
    #[serial]
    fn loads_encrypted_passwords_given_the_matching_key() {
        let dir = tempfile::tempdir().unwrap();
        let key = b"a-thirty-two-byte-test-key-here";
        std::fs::write(dir.path().join("test.key"), key).unwrap();

        let encrypted = SAMPLE
            .replace("password_encryption = false", "password_encryption = true")
            .replace("plain-db-pass", &cipher::encrypt("plain-db-pass", key))
            .replace("plain-user-pass", &cipher::encrypt("plain-user-pass", key))
            .replace("plain-admin-pass", &cipher::encrypt("plain-admin-pass", key));
        std::fs::write(dir.path().join("node.toml"), encrypted).unwrap();

        let config = load(dir.path().join("node.toml"), dir.path(), "test").unwrap();
        assert_eq!(config.store.password, "plain-db-pass");
        assert_eq!(config.admin_api.credentials.password, "plain-admin-pass");
    }

    #[test]
    #[serial]
    fn env_overrides_apply_after_file_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());

        std::env::set_var("MESHCHAIN_USER_API_PORT", "9999");
        std::env::set_var("MESHCHAIN_ADMIN_API_CREDENTIALS", "root:swordfish");
        let config = load(&path, dir.path(), "test").unwrap();
        std::env::remove_var("MESHCHAIN_USER_API_PORT");
        std::env::remove_var("MESHCHAIN_ADMIN_API_CREDENTIALS");

        assert_eq!(config.user_api.port, 9999);
        assert_eq!(config.admin_api.credentials.username, "root");
        assert_eq!(config.admin_api.credentials.password, "swordfish");
    }
}
