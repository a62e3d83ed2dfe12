//! Chain identifier bound once before genesis

use crate::store::KvStore;
use once_cell::sync::OnceCell;

/// Reserved module handled by the application itself rather than the handler.
pub const MODULE_NAME_BASE: &str = "base";
/// Reserved key under [`MODULE_NAME_BASE`] holding the chain id.
pub const CHAIN_KEY: &str = "chain_id";

/// Storage key of the chain id: `base/chain_id`.
pub fn chain_id_key() -> Vec<u8> {
    format!("{}/{}", MODULE_NAME_BASE, CHAIN_KEY).into_bytes()
}

/// Reads and writes the chain id. Once a non-empty id has been read from a
/// committed snapshot it is cached for the life of the process.
#[derive(Debug, Default)]
pub struct ChainIdentity {
    cached: OnceCell<String>,
}

impl ChainIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` as the chain id into `view`.
    pub fn bind(&self, view: &mut dyn KvStore, value: &str) {
        view.set(chain_id_key(), value.as_bytes().to_vec());
    }

    /// Chain id stored in `view`, or the empty string before genesis.
    pub fn get(&self, view: &dyn KvStore) -> String {
        if let Some(id) = self.cached.get() {
            return id.clone();
        }
        let id = view
            .get(&chain_id_key())
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_default();
        if id.is_empty() {
            return id;
        }
        self.cached.get_or_init(|| id).clone()
    }
}
