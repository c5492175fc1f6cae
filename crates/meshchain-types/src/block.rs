use serde::{Deserialize, Serialize};

use crate::hashing::{CanonicalHasher, Hash32};

/// An immutable, signed, hash-linked batch of sealed Txs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub height:     u64,
    pub hash:       Hash32,
    pub prev_hash:  Hash32,
    pub tx_ids:     Vec<String>,
    pub tx_root:    Hash32,
    pub signer:     String,
    pub signature:  String,
    pub created_at: u64
}

impl Block {
    /// The empty block at height 0, with a zero `prev_hash`.
    pub fn genesis(signer: &str, created_at: u64) -> Self {
        let tx_root = tx_root(&[]);
        let hash = header_hash(0, Hash32::ZERO, tx_root, signer, created_at);
        Block {
            height: 0,
            hash,
            prev_hash: Hash32::ZERO,
            tx_ids: Vec::new(),
            tx_root,
            signer: signer.to_string(),
            signature: String::new(),
            created_at
        }
    }
}

/// `H(concat tx_ids)` — the hash over the ordered list of transaction ids
/// included in a block.
pub fn tx_root(tx_ids: &[String]) -> Hash32 {
    let mut hasher = CanonicalHasher::new();
    hasher.update_u64(tx_ids.len() as u64);
    for id in tx_ids {
        hasher.update_str(id);
    }
    hasher.finish()
}

/// `H(height ∥ prev_hash ∥ tx_root ∥ signer ∥ created_at)` — the single
/// documented hashing discipline for a block header, excluding `hash` itself.
pub fn header_hash(
    height: u64,
    prev_hash: Hash32,
    tx_root: Hash32,
    signer: &str,
    created_at: u64
) -> Hash32 {
    CanonicalHasher::new()
        .update_u64(height)
        .update_hash(prev_hash)
        .update_hash(tx_root)
        .update_str(signer)
        .update_u64(created_at)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_has_zero_prev_hash() {
        let g = Block::genesis("node-a", 0);
        assert_eq!(g.height, 0);
        assert_eq!(g.prev_hash, Hash32::ZERO);
    }

    #[test]
    fn tx_root_changes_with_order() {
        let a = tx_root(&["1".into(), "2".into()]);
        let b = tx_root(&["2".into(), "1".into()]);
        assert_ne!(a, b);
    }
}
