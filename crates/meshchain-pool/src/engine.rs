//! The heart of the node: tenant-scoped ingress, cross-peer delivery,
//! block sealing, history walks, and the four scan-and-fix tasks.
//! `PoolEngine` is an `Arc`-backed handle around `Inner`, so the engine
//! can be cloned cheaply and shared across the scheduler, the RPC layer,
//! and the API edge.

use std::{collections::HashMap, sync::Arc, time::{Duration, Instant}};

use async_trait::async_trait;
use meshchain_keyring::Keyring;
use meshchain_metrics::MeshMetrics;
use meshchain_store::DataStore;
use meshchain_types::{
    block::{header_hash, tx_root},
    id::generate_object_id,
    mesh_err, Block, Error, ErrorKind, MeshResult, NewTxRequest, Tx
};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::{
    config::PoolConfig,
    peer_link::{InboundHandler, PeerHead, PeerLink}
};

const COMPONENT: &str = "meshchain-pool";

/// Outcome of one delivery round, surfaced to the scheduler/API caller for
/// logging: on any peer failure the Tx is left in `pooled` for the next
/// tick rather than partially delivered.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub retained:  usize
}

/// Outcome of a `sys/syncblocked` catch-up attempt.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    UpToDate,
    CaughtUp { appended: u64 },
    Diverged { peer: String }
}

/// Report produced by `postScanAndFixBlock`: corruptions found, never
/// auto-repaired.
#[derive(Debug, Clone)]
pub struct BlockAudit {
    pub corrupt: Vec<Error>
}

struct Inner {
    store:     Arc<dyn DataStore>,
    keyring:   Arc<Keyring>,
    peer_link: Arc<dyn PeerLink>,
    config:    PoolConfig,
    /// Known peers' verifying keys, hex-encoded, keyed by the identity
    /// string that appears in `Block.signer`. `scan_and_fix_block` resolves
    /// a block's signer through this map — falling back to the local
    /// keyring's own key when `signer` is this node's identity — since
    /// `Block.signer` alone carries no key material.
    peer_keys: HashMap<String, String>,
    metrics:   MeshMetrics,
    /// Serializes delivery and sealing against each other and against
    /// `insertPool`.
    pool_mutex: AsyncMutex<()>
}

/// `Arc`-wrapped handle around [`Inner`]; cheap to clone, shared across
/// every component that needs to touch the pool.
#[derive(Clone)]
pub struct PoolEngine(Arc<Inner>);

impl PoolEngine {
    /// `peer_keys` maps every other cluster member's node identity to its
    /// Ed25519 verifying key, hex-encoded — required to authenticate blocks
    /// sealed by a signer other than this node (e.g. appended via
    /// `sync_blocked`). An identity absent from the map is reported as an
    /// unknown signer by `scan_and_fix_block` rather than silently skipped.
    pub fn new(
        store: Arc<dyn DataStore>,
        keyring: Arc<Keyring>,
        peer_link: Arc<dyn PeerLink>,
        config: PoolConfig,
        peer_keys: HashMap<String, String>,
        metrics: MeshMetrics
    ) -> Self {
        Self(Arc::new(Inner { store, keyring, peer_link, config, peer_keys, metrics, pool_mutex: AsyncMutex::new(()) }))
    }

    async fn report_depths(&self) -> MeshResult<()> {
        let node = self.0.keyring.node_identity();
        let pooled = self.0.store.list_pool(None, true).await?.len();
        let delivered = self.0.store.list_delivered(None, true).await?.len();
        self.0.metrics.set_pool_depth(node, pooled);
        self.0.metrics.set_delivered_depth(node, delivered);
        Ok(())
    }

    /// Resolves `signer` to a hex-encoded verifying key: the local
    /// keyring's own key when `signer` is this node's identity, otherwise a
    /// lookup in `peer_keys`.
    fn signer_key_hex(&self, signer: &str) -> Option<String> {
        if signer == self.0.keyring.node_identity() {
            Some(self.0.keyring.verifying_key_hex())
        } else {
            self.0.peer_keys.get(signer).cloned()
        }
    }

    fn validate_ingress(&self, req: &NewTxRequest) -> MeshResult<()> {
        let payload_len = serde_json::to_vec(&req.data).map(|b| b.len()).unwrap_or(usize::MAX);
        if payload_len > self.0.config.max_payload_bytes {
            return Err(mesh_err!(
                ErrorKind::PayloadTooLarge,
                COMPONENT,
                "validate_ingress",
                "payload of {payload_len} bytes exceeds ceiling of {}",
                self.0.config.max_payload_bytes
            ));
        }
        if req.tx_type.requires_prev_id() && req.prev_id.is_none() {
            return Err(mesh_err!(
                ErrorKind::ValidationError,
                COMPONENT,
                "validate_ingress",
                "type {:?} requires prev_id",
                req.tx_type
            ));
        }
        Ok(())
    }

    /// `post/byjson`: validate, resolve history link, allocate an id, insert
    /// into `pooled`. `tenant` must already be resolved and confirmed open
    /// by the caller — that check happens at the API edge, not here.
    pub async fn ingress(&self, tenant: Uuid, req: NewTxRequest, now_ms: u64, id_counter: u32) -> MeshResult<String> {
        self.validate_ingress(&req)?;

        if let Some(prev_id) = &req.prev_id {
            match self.0.store.tx_by_id_across_collections(prev_id).await? {
                Some((prev_tx, _)) if prev_tx.tenant == tenant => {}
                Some(_) => {
                    return Err(mesh_err!(
                        ErrorKind::ValidationError,
                        COMPONENT,
                        "ingress",
                        "prev_id {prev_id} belongs to a different tenant"
                    ));
                }
                None => {
                    return Err(mesh_err!(
                        ErrorKind::NotFound,
                        COMPONENT,
                        "ingress",
                        "prev_id {prev_id} does not exist"
                    ));
                }
            }
        }

        let id = generate_object_id((now_ms / 1000) as u32, id_counter);
        let tx = Tx {
            id: id.clone(),
            tenant,
            tx_type: req.tx_type,
            prev_id: req.prev_id,
            data: req.data,
            created_at: now_ms
        };

        let _guard = self.0.pool_mutex.lock().await;
        self.0.store.insert_pool(tx).await?;
        drop(_guard);
        self.report_depths().await?;
        Ok(id)
    }

    /// `sys/deliverpooling`. `min_age_ms` narrows the round to Txs older
    /// than a threshold, as `postDeliveryPool` does on its own schedule;
    /// `None` delivers every pooled Tx, as the admin-triggered endpoint
    /// does.
    pub async fn deliver_pooling(&self, now_ms: u64, min_age_ms: Option<u64>) -> MeshResult<DeliveryReport> {
        let _guard = self.0.pool_mutex.lock().await;

        let candidates: Vec<Tx> = self
            .0
            .store
            .list_pool(None, true)
            .await?
            .into_iter()
            .filter(|tx| match min_age_ms {
                Some(min_age) => now_ms.saturating_sub(tx.created_at) >= min_age,
                None => true
            })
            .collect();

        let peers = self.0.peer_link.known_peers();
        let mut report = DeliveryReport::default();
        let mut by_tenant: std::collections::HashMap<Uuid, Vec<String>> = std::collections::HashMap::new();

        for tx in candidates {
            let mut all_ok = true;
            for peer in &peers {
                if let Err(err) = self.0.peer_link.deliver_tx(peer, &tx).await {
                    tracing::debug!(peer, tx_id = %tx.id, error = %err, "delivery attempt failed, retaining for next tick");
                    self.0.metrics.incr_delivery_failure(peer.clone());
                    all_ok = false;
                }
            }
            if all_ok {
                by_tenant.entry(tx.tenant).or_default().push(tx.id.clone());
                report.delivered += 1;
            } else {
                report.retained += 1;
            }
        }

        for (tenant, ids) in by_tenant {
            self.0.store.move_pool_to_delivered(tenant, &ids).await?;
        }

        drop(_guard);
        self.report_depths().await?;
        Ok(report)
    }

    /// `sys/blocking`: snapshot `delivered`, order, hash-link, sign, seal.
    /// Retries `seal_block` up to `config.seal_retries` times on
    /// `StoreConflict` before giving up with `BlockingFailed`.
    pub async fn seal(&self, now_ms: u64) -> MeshResult<Block> {
        let started = Instant::now();
        let _guard = self.0.pool_mutex.lock().await;

        let mut delivered = self.0.store.list_delivered(None, true).await?;
        delivered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        let tx_ids: Vec<String> = delivered.iter().map(|tx| tx.id.clone()).collect();

        let last = self.0.store.last_block().await?;
        let height = last.height + 1;
        let root = tx_root(&tx_ids);
        let signer = self.0.keyring.node_identity().to_string();
        let hash = header_hash(height, last.hash, root, &signer, now_ms);
        let signature = self.0.keyring.sign(hash);

        let block = Block { height, hash, prev_hash: last.hash, tx_ids: tx_ids.clone(), tx_root: root, signer, signature, created_at: now_ms };

        let mut attempt = 0;
        loop {
            match self.0.store.seal_block(block.clone(), &tx_ids).await {
                Ok(()) => {
                    let node = self.0.keyring.node_identity();
                    self.0.metrics.record_seal_duration(node, started.elapsed());
                    self.0.metrics.set_chain_height(node, block.height);
                    return Ok(block);
                }
                Err(err) if err.kind == ErrorKind::StoreConflict && attempt < self.0.config.seal_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %err, "seal_block conflict, retrying");
                }
                Err(err) if err.kind == ErrorKind::StoreConflict => {
                    return Err(mesh_err!(
                        ErrorKind::BlockingFailed,
                        COMPONENT,
                        "seal",
                        "sealBlock failed after {attempt} retries: {err}"
                    ));
                }
                Err(err) => return Err(err)
            }
        }
    }

    /// `postScanAndFixPool`: remove pool/delivered copies of Txs already
    /// present in a sealed block. Checks `is_sealed` directly rather than
    /// `tx_by_id_across_collections`, which would report a pool/delivered
    /// copy back as `Pooled`/`Delivered` — its own collection always wins
    /// that lookup's priority order, so it can never see the very
    /// duplicate this scan exists to find.
    pub async fn scan_and_fix_pool(&self) -> MeshResult<usize> {
        let mut duplicate_ids = Vec::new();
        for tx in self.0.store.list_pool(None, true).await? {
            if self.0.store.is_sealed(&tx.id).await? {
                duplicate_ids.push(tx.id);
            }
        }
        for tx in self.0.store.list_delivered(None, true).await? {
            if self.0.store.is_sealed(&tx.id).await? {
                duplicate_ids.push(tx.id);
            }
        }
        duplicate_ids.sort();
        duplicate_ids.dedup();
        self.0.store.remove_from_pool_and_delivered(&duplicate_ids).await
    }

    /// `postScanAndFixBlock`: verify every block's hash, signature, and
    /// prev-link. Reports corruption, never rewrites.
    pub async fn scan_and_fix_block(&self) -> MeshResult<BlockAudit> {
        let last = self.0.store.last_block().await?;
        let mut corrupt = Vec::new();
        let mut prev: Option<Block> = None;

        for height in 0..=last.height {
            let Some(block) = self.0.store.get_block_by_height(height).await? else {
                corrupt.push(mesh_err!(ErrorKind::CorruptHistory, COMPONENT, "scan_and_fix_block", "missing block at height {height}"));
                continue;
            };

            let expected_root = tx_root(&block.tx_ids);
            if expected_root != block.tx_root {
                corrupt.push(mesh_err!(ErrorKind::CorruptHistory, COMPONENT, "scan_and_fix_block", "tx_root mismatch at height {height}"));
            }

            let expected_hash = header_hash(block.height, block.prev_hash, block.tx_root, &block.signer, block.created_at);
            if expected_hash != block.hash {
                corrupt.push(mesh_err!(ErrorKind::CorruptHistory, COMPONENT, "scan_and_fix_block", "hash mismatch at height {height}"));
            } else if !block.signature.is_empty() {
                match self.signer_key_hex(&block.signer) {
                    None => corrupt.push(mesh_err!(
                        ErrorKind::CorruptHistory,
                        COMPONENT,
                        "scan_and_fix_block",
                        "block at height {height} signed by unknown signer {}",
                        block.signer
                    )),
                    Some(key) if meshchain_keyring::verify(&key, &block.signature, block.hash).is_err() => corrupt.push(mesh_err!(
                        ErrorKind::CorruptHistory,
                        COMPONENT,
                        "scan_and_fix_block",
                        "signature does not verify at height {height}"
                    )),
                    Some(_) => {}
                }
            }

            if let Some(prev_block) = &prev {
                if block.prev_hash != prev_block.hash {
                    corrupt.push(mesh_err!(ErrorKind::CorruptHistory, COMPONENT, "scan_and_fix_block", "prev_hash does not chain at height {height}"));
                }
            }
            prev = Some(block);
        }

        Ok(BlockAudit { corrupt })
    }

    /// `sys/syncblocked`: probe every peer's head; if a peer is strictly
    /// ahead and prefix-compatible, append the missing blocks. Diverging
    /// prefixes are reported, never auto-repaired.
    pub async fn sync_blocked(&self) -> MeshResult<SyncOutcome> {
        let local = self.0.store.last_block().await?;
        let peers = self.0.peer_link.known_peers();

        let mut best: Option<(String, PeerHead)> = None;
        for peer in &peers {
            let head = self.0.peer_link.peer_head(peer).await?;
            if head.height > local.height && best.as_ref().map(|(_, b)| head.height > b.height).unwrap_or(true) {
                best = Some((peer.clone(), head));
            }
        }

        let Some((peer, head)) = best else { return Ok(SyncOutcome::UpToDate) };

        let fetched = self.0.peer_link.fetch_blocks_from(&peer, local.height).await?;
        let mut appended = 0u64;
        let mut cursor = local;

        for block in fetched {
            if block.height != cursor.height + 1 || block.prev_hash != cursor.hash {
                return Ok(SyncOutcome::Diverged { peer });
            }
            self.0.store.append_block(block.clone()).await?;
            self.0.store.remove_from_pool_and_delivered(&block.tx_ids).await?;
            cursor = block;
            appended += 1;
        }

        if cursor.height != head.height || cursor.hash != head.hash {
            return Ok(SyncOutcome::Diverged { peer });
        }

        Ok(SyncOutcome::CaughtUp { appended })
    }

    pub async fn history(&self, terminal_id: &str) -> MeshResult<Vec<Tx>> {
        self.0.store.history_by_terminal_id(terminal_id).await
    }

    pub fn delivery_timeout(&self) -> Duration {
        self.0.config.delivery_timeout
    }

    pub fn redeliver_after(&self) -> Duration {
        self.0.config.redeliver_after
    }
}

#[async_trait]
impl InboundHandler for PoolEngine {
    async fn on_deliver_tx(&self, tx: Tx) -> MeshResult<()> {
        self.0.store.insert_delivered_direct(tx).await
    }

    async fn on_head_query(&self) -> MeshResult<PeerHead> {
        let block = self.0.store.last_block().await?;
        Ok(PeerHead { height: block.height, hash: block.hash })
    }

    async fn on_fetch_blocks(&self, from_height: u64) -> MeshResult<Vec<Block>> {
        let last = self.0.store.last_block().await?;
        let mut blocks = Vec::new();
        let mut h = from_height + 1;
        while h <= last.height {
            if let Some(block) = self.0.store.get_block_by_height(h).await? {
                blocks.push(block);
            }
            h += 1;
        }
        Ok(blocks)
    }
}

