use async_trait::async_trait;
use meshchain_types::{Block, MeshResult, Tx, TxState};
use uuid::Uuid;

/// The narrow capability set the rest of the node is granted onto
/// persistence. Every call is tenant-scoped unless `all=true` is passed
/// explicitly (the admin cross-tenant escape hatch).
///
/// Implementations: [`crate::memory::InMemoryStore`] (default, used by tests
/// and single-process deployments) and, behind the
/// [`crate::document::DocumentStoreDriver`] boundary, a real document-store
/// adapter — out of scope here, since the concrete document store is an
/// external collaborator with a documented interface only.
#[async_trait]
#[auto_impl::auto_impl(Arc)]
pub trait DataStore: Send + Sync {
    /// Inserts a freshly-ingressed Tx into the local `pooled` collection.
    async fn insert_pool(&self, tx: Tx) -> MeshResult<()>;

    /// Inserts a Tx directly into `delivered`, bypassing `pooled` entirely.
    /// Used by the inbound RPC handler for peer-delivered Txs, which skip
    /// the pooled state entirely.
    async fn insert_delivered_direct(&self, tx: Tx) -> MeshResult<()>;

    async fn list_pool(&self, tenant: Option<Uuid>, all: bool) -> MeshResult<Vec<Tx>>;

    async fn list_delivered(&self, tenant: Option<Uuid>, all: bool) -> MeshResult<Vec<Tx>>;

    async fn list_blocked(&self, tenant: Option<Uuid>, all: bool) -> MeshResult<Vec<Tx>>;

    /// Moves the given ids from `pooled` to `delivered` for `tenant`. Used
    /// once all reachable peers have acknowledged a delivery round.
    async fn move_pool_to_delivered(&self, tenant: Uuid, ids: &[String]) -> MeshResult<()>;

    /// Atomically appends `block` and removes `tx_ids` from the
    /// pool/delivered collections. On failure, leaves pool and blocks
    /// unchanged.
    async fn seal_block(&self, block: Block, tx_ids: &[String]) -> MeshResult<()>;

    /// Appends a block received from a peer during catch-up
    /// (`sys/syncblocked`), without touching pool/delivered.
    async fn append_block(&self, block: Block) -> MeshResult<()>;

    /// The block with the maximum height, or the genesis block if none has
    /// been sealed yet.
    async fn last_block(&self) -> MeshResult<Block>;

    async fn get_block_by_height(&self, height: u64) -> MeshResult<Option<Block>>;

    /// Looks a Tx up across pool/delivered/blocked, returning which
    /// collection currently holds it.
    async fn tx_by_id_across_collections(&self, id: &str) -> MeshResult<Option<(Tx, TxState)>>;

    /// Whether `id` is sealed into some block's body. Checks `blocked`
    /// directly rather than going through the pool/delivered-first priority
    /// of `tx_by_id_across_collections`, so it still answers correctly for
    /// an id that also has a stale copy sitting in `pooled`/`delivered`.
    async fn is_sealed(&self, id: &str) -> MeshResult<bool>;

    /// Walks `prev_id` backward from `terminal_id`, returning the chain
    /// oldest-first. `CorruptHistory` on cycle detection.
    async fn history_by_terminal_id(&self, terminal_id: &str) -> MeshResult<Vec<Tx>>;

    /// Removes the given ids from pool and delivered, wherever they
    /// currently live — used by `postScanAndFixPool` once a scan proves
    /// they were already sealed into a block. Returns how many were
    /// actually removed.
    async fn remove_from_pool_and_delivered(&self, ids: &[String]) -> MeshResult<usize>;

    /// Resets all collections to the empty, genesis-only state. Used by
    /// `/sys/initbc` when `trytoreset=true`.
    async fn reset(&self, genesis: Block) -> MeshResult<()>;
}
