//! Binary Merkle commitment over the committed key/value snapshot.
//!
//! Leaves are the entries in key byte order. An odd node at the end of a
//! level is promoted unchanged to the next level.

use super::kv::MemKv;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

pub fn leaf_hash(key: &[u8], value: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update((key.len() as u32).to_le_bytes());
    hasher.update(key);
    hasher.update(value);
    hasher.finalize().into()
}

fn node_hash(left: &Sha256Hash, right: &Sha256Hash) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn next_level(level: &[Sha256Hash]) -> Vec<Sha256Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => node_hash(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

fn leaves(state: &MemKv) -> Vec<Sha256Hash> {
    state.iter().map(|(k, v)| leaf_hash(k, v)).collect()
}

/// Root hash of the snapshot. The empty snapshot hashes to `sha256("")`.
pub fn root_hash(state: &MemKv) -> Sha256Hash {
    let mut level = leaves(state);
    if level.is_empty() {
        return Sha256::digest([]).into();
    }
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Sibling path from one leaf up to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub index: u64,
    pub leaf_count: u64,
    pub siblings: Vec<Sha256Hash>,
}

impl InclusionProof {
    /// Builds the proof for `key`, or `None` when the key is absent.
    pub fn build(state: &MemKv, key: &[u8]) -> Option<Self> {
        let index = state.index_of(key)?;
        let mut level = leaves(state);
        let leaf_count = level.len() as u64;
        let mut position = index;
        let mut siblings = Vec::new();

        while level.len() > 1 {
            let sibling = position ^ 1;
            if sibling < level.len() {
                siblings.push(level[sibling]);
            }
            level = next_level(&level);
            position /= 2;
        }

        Some(Self {
            index: index as u64,
            leaf_count,
            siblings,
        })
    }

    pub fn verify(&self, key: &[u8], value: &[u8], root: &Sha256Hash) -> bool {
        if self.index >= self.leaf_count {
            return false;
        }
        let mut hash = leaf_hash(key, value);
        let mut position = self.index;
        let mut width = self.leaf_count;
        let mut siblings = self.siblings.iter();

        while width > 1 {
            let sibling = position ^ 1;
            if sibling < width {
                let Some(other) = siblings.next() else {
                    return false;
                };
                hash = if position % 2 == 0 {
                    node_hash(&hash, other)
                } else {
                    node_hash(other, &hash)
                };
            }
            position /= 2;
            width = width.div_ceil(2);
        }

        siblings.next().is_none() && &hash == root
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AppError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AppError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStore;

    fn state_with(n: usize) -> MemKv {
        (0..n)
            .map(|i| (format!("key-{:02}", i).into_bytes(), vec![i as u8; 3]))
            .collect()
    }

    #[test]
    fn test_root_changes_with_state() {
        let mut state = state_with(3);
        let before = root_hash(&state);
        assert_eq!(before, root_hash(&state.clone()));
        state.set(b"key-00".to_vec(), b"changed".to_vec());
        assert_ne!(before, root_hash(&state));
    }

    #[test]
    fn test_empty_root_is_stable() {
        assert_eq!(root_hash(&MemKv::new()), root_hash(&MemKv::new()));
    }

    #[test]
    fn test_proofs_verify_for_odd_and_even_trees() {
        for n in [1usize, 2, 5, 8] {
            let state = state_with(n);
            let root = root_hash(&state);
            for (key, value) in state.iter() {
                let proof = InclusionProof::build(&state, key).unwrap();
                assert!(proof.verify(key, value, &root), "n={} key={:?}", n, key);
                assert!(!proof.verify(key, b"forged", &root));
            }
        }
    }

    #[test]
    fn test_proof_for_missing_key() {
        assert!(InclusionProof::build(&state_with(4), b"absent").is_none());
    }

    #[test]
    fn test_proof_bytes() {
        let state = state_with(6);
        let proof = InclusionProof::build(&state, b"key-03").unwrap();
        let decoded = InclusionProof::from_bytes(&proof.to_bytes().unwrap()).unwrap();
        assert_eq!(proof, decoded);
    }
}
