//! Validator power changes accumulated over one block

use serde::{Deserialize, Serialize};

/// A change of voting power for one validator. Power 0 removes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: Vec<u8>,
    pub power: u64,
}

impl ValidatorUpdate {
    pub fn new(pub_key: impl Into<Vec<u8>>, power: u64) -> Self {
        Self {
            pub_key: pub_key.into(),
            power,
        }
    }
}

/// Predicate deciding whether two public keys name the same validator.
pub type KeyEq = fn(&[u8], &[u8]) -> bool;

/// Exact byte comparison.
pub fn exact_bytes(a: &[u8], b: &[u8]) -> bool {
    a == b
}

/// Pending validator changes for the current block, in first-seen order with
/// at most one entry per key.
#[derive(Debug, Clone)]
pub struct ValidatorChangeSet {
    pending: Vec<ValidatorUpdate>,
    key_eq: KeyEq,
}

impl Default for ValidatorChangeSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorChangeSet {
    pub fn new() -> Self {
        Self::with_key_eq(exact_bytes)
    }

    pub fn with_key_eq(key_eq: KeyEq) -> Self {
        Self {
            pending: Vec::new(),
            key_eq,
        }
    }

    /// Overwrites the power of an already pending key in place, appends otherwise.
    pub fn merge<I>(&mut self, diffs: I)
    where
        I: IntoIterator<Item = ValidatorUpdate>,
    {
        for diff in diffs {
            match self.position(&diff.pub_key) {
                Some(idx) => self.pending[idx] = diff,
                None => self.pending.push(diff),
            }
        }
    }

    /// Hands out everything accumulated since the previous drain.
    pub fn drain(&mut self) -> Vec<ValidatorUpdate> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[ValidatorUpdate] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn position(&self, pub_key: &[u8]) -> Option<usize> {
        self.pending
            .iter()
            .position(|v| (self.key_eq)(&v.pub_key, pub_key))
    }
}
