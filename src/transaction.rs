//! Transaction envelope and its wire codec

use crate::error::AppError;
use bincode::Options;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Decoded form of submitted transaction bytes. `route` names the handler
/// path (for example `kv/set`); `payload` is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEnvelope {
    pub route: String,
    pub payload: Vec<u8>,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .with_limit(MAX_TRANSACTION_SIZE as u64)
}

impl TxEnvelope {
    pub fn new(route: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            route: route.into(),
            payload: payload.into(),
        }
    }

    /// Parses raw bytes. Pure: no state is read or written.
    pub fn decode(raw: &[u8]) -> Result<Self, AppError> {
        if raw.is_empty() {
            return Err(AppError::Decode("empty transaction".to_string()));
        }
        if raw.len() > MAX_TRANSACTION_SIZE {
            return Err(AppError::Decode(format!(
                "Transaction too large: {} bytes (max: {})",
                raw.len(),
                MAX_TRANSACTION_SIZE
            )));
        }

        let tx: TxEnvelope = codec()
            .deserialize(raw)
            .map_err(|e| AppError::Decode(e.to_string()))?;

        if tx.route.is_empty() {
            return Err(AppError::Decode("transaction route is empty".to_string()));
        }
        Ok(tx)
    }

    pub fn encode(&self) -> Result<Vec<u8>, AppError> {
        Ok(codec().serialize(self)?)
    }

    /// Module part of the route, i.e. everything before the first `/`.
    pub fn module(&self) -> &str {
        self.route.split('/').next().unwrap_or_default()
    }
}

/// SHA-256 of the raw bytes, hex encoded. Used to correlate log lines.
pub fn tx_hash_str(raw: &[u8]) -> String {
    hex::encode(Sha256::digest(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let tx = TxEnvelope::new("kv/set", b"a=1".to_vec());
        let raw = tx.encode().unwrap();
        assert_eq!(TxEnvelope::decode(&raw).unwrap(), tx);
        assert_eq!(tx.module(), "kv");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(TxEnvelope::decode(&[]), Err(AppError::Decode(_))));
        assert!(matches!(TxEnvelope::decode(&[0xff; 3]), Err(AppError::Decode(_))));

        let raw = TxEnvelope::new("kv/set", b"a=1".to_vec()).encode().unwrap();
        assert!(matches!(
            TxEnvelope::decode(&raw[..raw.len() - 1]),
            Err(AppError::Decode(_))
        ));

        let mut trailing = raw.clone();
        trailing.push(0);
        assert!(matches!(TxEnvelope::decode(&trailing), Err(AppError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_empty_route() {
        let raw = TxEnvelope::new("", b"x".to_vec()).encode().unwrap();
        assert!(matches!(TxEnvelope::decode(&raw), Err(AppError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let raw = vec![0u8; MAX_TRANSACTION_SIZE + 1];
        let err = TxEnvelope::decode(&raw).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(tx_hash_str(b"abc"), tx_hash_str(b"abc"));
        assert_eq!(tx_hash_str(b"abc").len(), 64);
    }
}
