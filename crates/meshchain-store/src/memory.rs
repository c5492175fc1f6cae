use std::collections::HashMap;

use async_trait::async_trait;
use meshchain_types::{mesh_err, Block, Error, ErrorKind, MeshResult, Tx, TxState};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::facade::DataStore;

const COMPONENT: &str = "meshchain-store";

struct State {
    pool:         HashMap<String, Tx>,
    delivered:    HashMap<String, Tx>,
    blocks:       Vec<Block>,
    /// Bodies of Txs sealed into each block, keyed by block hash then Tx id.
    /// Sealing moves a Tx out of `pool`/`delivered`, but `get/blocked`,
    /// `get/history`, and `get/byoid` still need to read its fields back.
    block_bodies: HashMap<meshchain_types::Hash32, HashMap<String, Tx>>
}

impl State {
    fn genesis(genesis: Block) -> Self {
        Self {
            pool: HashMap::new(),
            delivered: HashMap::new(),
            blocks: vec![genesis],
            block_bodies: HashMap::new()
        }
    }

    fn lookup_blocked(&self, id: &str) -> Option<&Tx> {
        self.block_bodies.values().find_map(|bodies| bodies.get(id))
    }
}

/// A pure in-memory [`DataStore`], used by default single-process
/// deployments, `testing-tools`, and every test in this workspace. Mirrors
/// the contract a real document-store adapter must honor, including
/// `seal_block`'s atomicity (here: a single mutex critical section stands in
/// for a multi-document transaction).
pub struct InMemoryStore {
    state: Mutex<State>
}

impl InMemoryStore {
    pub fn new(genesis: Block) -> Self {
        Self { state: Mutex::new(State::genesis(genesis)) }
    }

    fn not_found(site: &'static str, message: impl Into<String>) -> Error {
        mesh_err!(ErrorKind::NotFound, COMPONENT, site, "{}", message.into())
    }
}

fn matches_tenant(tx: &Tx, tenant: Option<Uuid>, all: bool) -> bool {
    all || tenant.map(|t| t == tx.tenant).unwrap_or(true)
}

#[async_trait]
impl DataStore for InMemoryStore {
    async fn insert_pool(&self, tx: Tx) -> MeshResult<()> {
        let mut state = self.state.lock();
        state.pool.insert(tx.id.clone(), tx);
        Ok(())
    }

    async fn insert_delivered_direct(&self, tx: Tx) -> MeshResult<()> {
        let mut state = self.state.lock();
        state.delivered.insert(tx.id.clone(), tx);
        Ok(())
    }

    async fn list_pool(&self, tenant: Option<Uuid>, all: bool) -> MeshResult<Vec<Tx>> {
        let state = self.state.lock();
        Ok(state
            .pool
            .values()
            .filter(|tx| matches_tenant(tx, tenant, all))
            .cloned()
            .collect())
    }

    async fn list_delivered(&self, tenant: Option<Uuid>, all: bool) -> MeshResult<Vec<Tx>> {
        let state = self.state.lock();
        Ok(state
            .delivered
            .values()
            .filter(|tx| matches_tenant(tx, tenant, all))
            .cloned()
            .collect())
    }

    async fn list_blocked(&self, tenant: Option<Uuid>, all: bool) -> MeshResult<Vec<Tx>> {
        let state = self.state.lock();
        Ok(state
            .block_bodies
            .values()
            .flat_map(|bodies| bodies.values())
            .filter(|tx| matches_tenant(tx, tenant, all))
            .cloned()
            .collect())
    }

    async fn move_pool_to_delivered(&self, tenant: Uuid, ids: &[String]) -> MeshResult<()> {
        let mut state = self.state.lock();
        for id in ids {
            if let Some(tx) = state.pool.get(id) {
                if tx.tenant != tenant {
                    continue;
                }
            } else {
                continue;
            }
            if let Some(tx) = state.pool.remove(id) {
                state.delivered.insert(tx.id.clone(), tx);
            }
        }
        Ok(())
    }

    async fn seal_block(&self, block: Block, tx_ids: &[String]) -> MeshResult<()> {
        let mut state = self.state.lock();
        let expected_height = state.blocks.last().map(|b| b.height + 1).unwrap_or(0);
        if block.height != expected_height {
            return Err(mesh_err!(
                ErrorKind::StoreConflict,
                COMPONENT,
                "seal_block",
                "expected height {expected_height}, got {}",
                block.height
            ));
        }

        for id in tx_ids {
            if !state.pool.contains_key(id) && !state.delivered.contains_key(id) {
                return Err(mesh_err!(
                    ErrorKind::StoreConflict,
                    COMPONENT,
                    "seal_block",
                    "tx {id} missing from pool/delivered at seal time"
                ));
            }
        }

        let mut bodies = HashMap::new();
        for id in tx_ids {
            if let Some(tx) = state.pool.get(id).or_else(|| state.delivered.get(id)) {
                bodies.insert(id.clone(), tx.clone());
            }
        }
        state.block_bodies.insert(block.hash, bodies);

        for id in tx_ids {
            state.pool.remove(id);
            state.delivered.remove(id);
        }
        state.blocks.push(block);
        Ok(())
    }

    async fn append_block(&self, block: Block) -> MeshResult<()> {
        let mut state = self.state.lock();
        let expected_height = state.blocks.last().map(|b| b.height + 1).unwrap_or(0);
        if block.height != expected_height {
            return Err(mesh_err!(
                ErrorKind::StoreConflict,
                COMPONENT,
                "append_block",
                "expected height {expected_height}, got {}",
                block.height
            ));
        }
        state.blocks.push(block);
        Ok(())
    }

    async fn last_block(&self) -> MeshResult<Block> {
        let state = self.state.lock();
        Ok(state.blocks.last().cloned().expect("genesis always present"))
    }

    async fn get_block_by_height(&self, height: u64) -> MeshResult<Option<Block>> {
        let state = self.state.lock();
        Ok(state.blocks.iter().find(|b| b.height == height).cloned())
    }

    async fn tx_by_id_across_collections(&self, id: &str) -> MeshResult<Option<(Tx, TxState)>> {
        let state = self.state.lock();
        if let Some(tx) = state.pool.get(id) {
            return Ok(Some((tx.clone(), TxState::Pooled)));
        }
        if let Some(tx) = state.delivered.get(id) {
            return Ok(Some((tx.clone(), TxState::Delivered)));
        }
        if let Some(tx) = state.lookup_blocked(id) {
            return Ok(Some((tx.clone(), TxState::Blocked)));
        }
        Ok(None)
    }

    async fn is_sealed(&self, id: &str) -> MeshResult<bool> {
        let state = self.state.lock();
        Ok(state.lookup_blocked(id).is_some())
    }

    async fn history_by_terminal_id(&self, terminal_id: &str) -> MeshResult<Vec<Tx>> {
        let state = self.state.lock();
        let lookup = |id: &str| -> Option<Tx> {
            if let Some(tx) = state.pool.get(id) {
                return Some(tx.clone());
            }
            if let Some(tx) = state.delivered.get(id) {
                return Some(tx.clone());
            }
            state.lookup_blocked(id).cloned()
        };

        let mut chain = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut cursor = Some(terminal_id.to_string());

        while let Some(id) = cursor.take() {
            if !seen.insert(id.clone()) {
                return Err(mesh_err!(
                    ErrorKind::CorruptHistory,
                    COMPONENT,
                    "history_by_terminal_id",
                    "cycle detected at tx {id}"
                ));
            }
            let tx = lookup(&id)
                .ok_or_else(|| Self::not_found("history_by_terminal_id", format!("tx {id} not found")))?;
            cursor = tx.prev_id.clone();
            chain.push(tx);
        }

        chain.reverse();
        Ok(chain)
    }

    async fn remove_from_pool_and_delivered(&self, ids: &[String]) -> MeshResult<usize> {
        let mut state = self.state.lock();
        let mut removed = 0;
        for id in ids {
            if state.pool.remove(id).is_some() {
                removed += 1;
            }
            if state.delivered.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn reset(&self, genesis: Block) -> MeshResult<()> {
        let mut state = self.state.lock();
        *state = State::genesis(genesis);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use meshchain_types::{Block, TxType};
    use uuid::Uuid;

    use super::*;

    fn sample_tx(tenant: Uuid, id: &str) -> Tx {
        Tx {
            id: id.to_string(),
            tenant,
            tx_type: TxType::New,
            prev_id: None,
            data: serde_json::json!({"desc": "test"}),
            created_at: 1
        }
    }

    #[tokio::test]
    async fn insert_then_list_pool() {
        let store = InMemoryStore::new(Block::genesis("node-a", 0));
        let tenant = Uuid::new_v4();
        store.insert_pool(sample_tx(tenant, "a".repeat(24).as_str())).await.unwrap();
        let pooled = store.list_pool(Some(tenant), false).await.unwrap();
        assert_eq!(pooled.len(), 1);
    }

    #[tokio::test]
    async fn seal_block_removes_from_pool() {
        let store = InMemoryStore::new(Block::genesis("node-a", 0));
        let tenant = Uuid::new_v4();
        let id = "b".repeat(24);
        store.insert_pool(sample_tx(tenant, &id)).await.unwrap();
        store.move_pool_to_delivered(tenant, &[id.clone()]).await.unwrap();

        let block = Block {
            height: 1,
            hash: meshchain_types::Hash32([1u8; 32]),
            prev_hash: meshchain_types::Hash32::ZERO,
            tx_ids: vec![id.clone()],
            tx_root: meshchain_types::Hash32([2u8; 32]),
            signer: "node-a".into(),
            signature: "sig".into(),
            created_at: 2
        };
        store.seal_block(block, &[id.clone()]).await.unwrap();

        assert!(store.list_pool(Some(tenant), false).await.unwrap().is_empty());
        assert!(store.list_delivered(Some(tenant), false).await.unwrap().is_empty());
        assert_eq!(store.last_block().await.unwrap().height, 1);
    }

    #[tokio::test]
    async fn history_walks_oldest_first() {
        let store = InMemoryStore::new(Block::genesis("node-a", 0));
        let tenant = Uuid::new_v4();
        let t1 = "1".repeat(24);
        let t2 = "2".repeat(24);
        let t3 = "3".repeat(24);

        let mut tx1 = sample_tx(tenant, &t1);
        tx1.created_at = 1;
        store.insert_pool(tx1).await.unwrap();

        let mut tx2 = sample_tx(tenant, &t2);
        tx2.tx_type = TxType::Update;
        tx2.prev_id = Some(t1.clone());
        tx2.created_at = 2;
        store.insert_pool(tx2).await.unwrap();

        let mut tx3 = sample_tx(tenant, &t3);
        tx3.tx_type = TxType::Update;
        tx3.prev_id = Some(t2.clone());
        tx3.created_at = 3;
        store.insert_pool(tx3).await.unwrap();

        let history = store.history_by_terminal_id(&t3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, t1);
        assert_eq!(history[2].id, t3);
    }

    #[tokio::test]
    async fn history_detects_cycles() {
        let store = InMemoryStore::new(Block::genesis("node-a", 0));
        let tenant = Uuid::new_v4();
        let t1 = "1".repeat(24);
        let t2 = "2".repeat(24);

        let mut tx1 = sample_tx(tenant, &t1);
        tx1.tx_type = TxType::Update;
        tx1.prev_id = Some(t2.clone());
        store.insert_pool(tx1).await.unwrap();

        let mut tx2 = sample_tx(tenant, &t2);
        tx2.tx_type = TxType::Update;
        tx2.prev_id = Some(t1.clone());
        store.insert_pool(tx2).await.unwrap();

        let err = store.history_by_terminal_id(&t1).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CorruptHistory);
    }
}
