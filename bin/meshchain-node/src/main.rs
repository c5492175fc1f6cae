//! Component C8, the main orchestrator: CLI parsing, the node's boot
//! sequence (Config → Logger → Keyring → DataStore → Pool & block engine →
//! inter-node RPC → event scheduler → HTTP APIs), and a reverse-order
//! shutdown fan-out on Ctrl-C. Mirrors `bin/testnet/src/main.rs`'s
//! `clap::Parser` CLI and `eyre::Result` main, generalized from a
//! single-purpose testnet launcher to the full node.

mod deferred_inbound;
mod logging;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use meshchain_api::build_states;
use meshchain_keyring::Keyring;
use meshchain_metrics::MeshMetrics;
use meshchain_net::{NetworkConfig, NetworkHandle};
use meshchain_pool::{PeerLink, PoolConfig, PoolEngine};
use meshchain_scheduler::{EventKind, PoolDispatcher, Scheduler};
use meshchain_store::{DataStore, InMemoryStore};
use meshchain_tenant::TenantRegistry;
use meshchain_types::Block;
use tokio::sync::watch;

use deferred_inbound::DeferredInbound;

#[derive(Parser)]
#[clap(about = "meshchain node")]
struct Cli {
    /// path to the node's TOML configuration file
    #[clap(long, default_value = "meshchain.toml")]
    config:   PathBuf,
    /// directory holding `<env>.key` password-decryption keys, read only
    /// when the config sets `password_encryption = true`
    #[clap(long, default_value = "keys")]
    key_dir:  PathBuf,
    /// selects which `<env>.key` file backs password decryption
    #[clap(long, default_value = "default")]
    env:      String
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    let config = meshchain_config::load(&cli.config, &cli.key_dir, &cli.env)?;

    let _log_guards = logging::init(&config.logging)?;
    tracing::info!(node = %config.node_identity, listen = %config.listen_addr, "booting meshchain node");

    let keyring = Arc::new(Keyring::load(&config.key_path, config.node_identity.clone())?);
    meshchain_metrics::describe();
    let metrics = MeshMetrics;

    // Cluster-uniform: every node in a mesh must compute the same height-0
    // hash, so genesis cannot fold in this node's own identity or boot
    // time — `sync_blocked`'s prefix check compares a lagging node's own
    // genesis hash against a peer's `prev_hash` at height 1.
    let genesis = Block::genesis("", 0);
    let store: Arc<dyn DataStore> = Arc::new(InMemoryStore::new(genesis));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let inbound = DeferredInbound::new();
    let net_handle = NetworkHandle::new(
        NetworkConfig {
            node_identity:   config.node_identity.clone(),
            peers:           config.peers.clone(),
            request_timeout: Duration::from_secs(5)
        },
        inbound.clone(),
        shutdown_rx.clone()
    );

    let pool = PoolEngine::new(
        store.clone(),
        keyring.clone(),
        Arc::new(net_handle.clone()) as Arc<dyn PeerLink>,
        PoolConfig { max_payload_bytes: config.max_payload_bytes, ..PoolConfig::default() },
        config.peer_keys.clone(),
        metrics
    );
    inbound.set(pool.clone());

    let listener_task = tokio::spawn(meshchain_net::listener::run(
        config.listen_addr,
        config.node_identity.clone(),
        inbound.clone(),
        shutdown_rx.clone()
    ));

    let tenants = Arc::new(TenantRegistry::new());

    let scheduler = Scheduler::new(Arc::new(PoolDispatcher::new(pool.clone())), Duration::from_secs(1));
    scheduler.register(EventKind::ScanPool, config.scan_interval, shutdown_rx.clone());
    scheduler.register(EventKind::ScanBlocks, config.scan_interval, shutdown_rx.clone());
    scheduler.register(EventKind::DeliverPool, config.delivery_interval, shutdown_rx.clone());
    scheduler.register(EventKind::AppendBlocks, config.scan_interval, shutdown_rx.clone());

    let (user_state, admin_state) =
        build_states(store, pool, tenants, metrics, config.node_identity.clone(), &config.user_api, &config.admin_api);

    let user_addr = SocketAddr::new(config.listen_addr.ip(), config.user_api.port);
    let admin_addr = SocketAddr::new(config.listen_addr.ip(), config.admin_api.port);

    let user_task = tokio::spawn(meshchain_api::serve(user_addr, meshchain_api::user_router(user_state), shutdown_rx.clone()));
    let admin_task = tokio::spawn(meshchain_api::serve(admin_addr, meshchain_api::admin_router(admin_state), shutdown_rx.clone()));

    tracing::info!(%user_addr, %admin_addr, "HTTP APIs listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, fanning out to every component");
    let _ = shutdown_tx.send(true);

    // Reverse boot order: APIs first, then the peer listener, then the
    // scheduler's own loop winds down on its next tick once it observes the
    // same signal. `keyring`'s private key is zeroized in `Drop`, which
    // fires once the last `Arc` clone — held by the (now-stopped) pool
    // engine — goes out of scope at the end of this function.
    user_task.await??;
    admin_task.await??;
    listener_task.await??;

    tracing::info!("meshchain node shut down cleanly");
    Ok(())
}
