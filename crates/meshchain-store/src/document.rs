//! The document-store adapter boundary.
//!
//! The document store (MongoDB-like, behind a narrow interface) is
//! deliberately out of scope: an external collaborator with a documented
//! interface only. This module is that documented interface — a trait a
//! real Mongo (or Mongo-compatible) driver would implement — plus a bounded
//! connection-pool wrapper (default 16). No concrete driver is shipped;
//! [`crate::memory::InMemoryStore`] is what actually backs the node in this
//! workspace.

use async_trait::async_trait;
use meshchain_types::MeshResult;
use tokio::sync::Semaphore;

/// One of the three collections named per node:
/// `pool_<node>`, `blocked_<node>`, `blocks_<node>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Pool,
    Blocked,
    Blocks
}

impl Collection {
    pub fn name(self, node_identity: &str) -> String {
        match self {
            Collection::Pool => format!("pool_{node_identity}"),
            Collection::Blocked => format!("blocked_{node_identity}"),
            Collection::Blocks => format!("blocks_{node_identity}")
        }
    }
}

/// The minimal operations a concrete document-store driver needs to expose
/// for [`crate::facade::DataStore`] to be built on top of it. Intentionally
/// narrow: raw JSON documents in, raw JSON documents out, plus the one
/// multi-document transaction primitive `seal_block` depends on.
#[async_trait]
pub trait DocumentStoreDriver: Send + Sync {
    async fn insert_one(&self, collection: Collection, document: serde_json::Value) -> MeshResult<()>;

    async fn find(
        &self,
        collection: Collection,
        filter: serde_json::Value
    ) -> MeshResult<Vec<serde_json::Value>>;

    async fn delete_many(&self, collection: Collection, ids: &[String]) -> MeshResult<usize>;

    /// Runs `body` inside a multi-document transaction. Implementations must
    /// roll back entirely on any `Err` returned from `body`, matching
    /// `seal_block`'s all-or-nothing contract.
    async fn with_transaction<F, Fut>(&self, body: F) -> MeshResult<()>
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = MeshResult<()>> + Send;
}

/// Bounds concurrent access to a [`DocumentStoreDriver`] to the configured
/// pool size, acquiring a permit around every call so
/// a burst of scheduler + API traffic can't open unbounded connections to
/// the backing store.
pub struct PooledDriver<D> {
    driver:  D,
    permits: Semaphore
}

impl<D: DocumentStoreDriver> PooledDriver<D> {
    pub fn new(driver: D, pool_size: usize) -> Self {
        Self { driver, permits: Semaphore::new(pool_size.max(1)) }
    }

    pub async fn with_connection<T>(
        &self,
        f: impl FnOnce(&D) -> std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + '_>>
    ) -> T {
        let _permit = self.permits.acquire().await.expect("semaphore not closed");
        f(&self.driver).await
    }
}
