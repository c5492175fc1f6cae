//! Binds the closed [`EventKind`] set to the pool & block engine operations
//! they drive. A `match` over a closed enum, not a string lookup — unknown
//! paths are a compile error here rather than a runtime `UnknownMethod`.

use async_trait::async_trait;
use meshchain_pool::PoolEngine;
use meshchain_types::MeshResult;

use crate::event::EventKind;

#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, kind: EventKind) -> MeshResult<()>;
}

pub struct PoolDispatcher {
    pool: PoolEngine
}

impl PoolDispatcher {
    pub fn new(pool: PoolEngine) -> Self {
        Self { pool }
    }

    fn now_ms() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as u64
    }
}

#[async_trait]
impl Dispatcher for PoolDispatcher {
    async fn dispatch(&self, kind: EventKind) -> MeshResult<()> {
        match kind {
            EventKind::ScanBlocks => {
                let audit = self.pool.scan_and_fix_block().await?;
                if !audit.corrupt.is_empty() {
                    for error in &audit.corrupt {
                        tracing::error!(%error, "block chain corruption detected");
                    }
                }
                Ok(())
            }
            EventKind::ScanPool => {
                let removed = self.pool.scan_and_fix_pool().await?;
                if removed > 0 {
                    tracing::info!(removed, "scan-and-fix removed already-sealed pool duplicates");
                }
                Ok(())
            }
            EventKind::DeliverPool => {
                let report = self.pool.deliver_pooling(Self::now_ms(), Some(self.pool.redeliver_after().as_millis() as u64)).await?;
                tracing::debug!(delivered = report.delivered, retained = report.retained, "scheduled delivery pass");
                Ok(())
            }
            EventKind::AppendBlocks => {
                let outcome = self.pool.sync_blocked().await?;
                tracing::debug!(?outcome, "scheduled catch-up pass");
                Ok(())
            }
        }
    }
}
