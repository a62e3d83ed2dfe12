//! Demo key/value handler
//!
//! Small enough to exercise every dispatch path end to end. Routes:
//! - `kv/set`: payload `key=value`, stored under `kv/<key>`
//! - `kv/remove`: payload `key`
//! - `val/set`: payload is a bincode [`ValidatorUpdate`]; stored under
//!   `val/<hex pubkey>` and reported as a validator diff
//!
//! Pre-genesis options for module `kv` seed `kv/<key>` directly.

use crate::error::{AppError, ResultCode};
use crate::handler::{CallContext, Handler, HandlerResponse};
use crate::store::KvStore;
use crate::transaction::TxEnvelope;
use crate::validators::ValidatorUpdate;
use tracing::{debug, Span};

pub const KV_MODULE: &str = "kv";
pub const VALIDATOR_MODULE: &str = "val";

#[derive(Debug, Clone, Default)]
pub struct KvStoreHandler;

enum Op {
    Set { key: String, value: String },
    Remove { key: String },
    Validator(ValidatorUpdate),
}

fn kv_key(key: &str) -> Vec<u8> {
    format!("{}/{}", KV_MODULE, key).into_bytes()
}

fn validator_key(pub_key: &[u8]) -> Vec<u8> {
    format!("{}/{}", VALIDATOR_MODULE, hex::encode(pub_key)).into_bytes()
}

impl KvStoreHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn set_tx(key: &str, value: &str) -> TxEnvelope {
        TxEnvelope::new("kv/set", format!("{}={}", key, value).into_bytes())
    }

    pub fn remove_tx(key: &str) -> TxEnvelope {
        TxEnvelope::new("kv/remove", key.as_bytes().to_vec())
    }

    pub fn validator_tx(pub_key: &[u8], power: u64) -> Result<TxEnvelope, AppError> {
        let payload = bincode::serialize(&ValidatorUpdate::new(pub_key.to_vec(), power))?;
        Ok(TxEnvelope::new("val/set", payload))
    }

    fn parse(tx: &TxEnvelope) -> Result<Op, AppError> {
        let text = || {
            std::str::from_utf8(&tx.payload)
                .map_err(|_| AppError::handler(ResultCode::EncodingError, "payload is not utf-8"))
        };

        match tx.route.as_str() {
            "kv/set" => {
                let (key, value) = text()?.split_once('=').ok_or_else(|| {
                    AppError::handler(ResultCode::EncodingError, "expected key=value")
                })?;
                if key.is_empty() {
                    return Err(AppError::handler(ResultCode::EncodingError, "empty key"));
                }
                Ok(Op::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            }
            "kv/remove" => {
                let key = text()?;
                if key.is_empty() {
                    return Err(AppError::handler(ResultCode::EncodingError, "empty key"));
                }
                Ok(Op::Remove {
                    key: key.to_string(),
                })
            }
            "val/set" => {
                let update: ValidatorUpdate = bincode::deserialize(&tx.payload).map_err(|e| {
                    AppError::handler(
                        ResultCode::EncodingError,
                        format!("bad validator update: {}", e),
                    )
                })?;
                if update.pub_key.is_empty() {
                    return Err(AppError::handler(ResultCode::EncodingError, "empty pub_key"));
                }
                Ok(Op::Validator(update))
            }
            other => Err(AppError::handler(
                ResultCode::UnknownRequest,
                format!("unrecognized route: {}", other),
            )),
        }
    }

    fn apply(&self, store: &mut dyn KvStore, tx: &TxEnvelope) -> Result<HandlerResponse, AppError> {
        match Self::parse(tx)? {
            Op::Set { key, value } => {
                store.set(kv_key(&key), value.into_bytes());
                Ok(HandlerResponse {
                    log: format!("set {}", key),
                    ..Default::default()
                })
            }
            Op::Remove { key } => match store.remove(&kv_key(&key)) {
                Some(previous) => Ok(HandlerResponse {
                    data: previous,
                    log: format!("removed {}", key),
                    ..Default::default()
                }),
                None => Err(AppError::handler(
                    ResultCode::UnknownRequest,
                    format!("no such key: {}", key),
                )),
            },
            Op::Validator(update) => {
                store.set(validator_key(&update.pub_key), update.power.to_le_bytes().to_vec());
                Ok(HandlerResponse {
                    log: format!("validator {} power {}", hex::encode(&update.pub_key), update.power),
                    diff: vec![update],
                    ..Default::default()
                })
            }
        }
    }
}

impl Handler for KvStoreHandler {
    fn check_tx(
        &self,
        _ctx: &CallContext,
        store: &mut dyn KvStore,
        tx: &TxEnvelope,
    ) -> Result<HandlerResponse, AppError> {
        self.apply(store, tx)
    }

    fn deliver_tx(
        &self,
        ctx: &CallContext,
        store: &mut dyn KvStore,
        tx: &TxEnvelope,
    ) -> Result<HandlerResponse, AppError> {
        debug!("kvstore deliver at height {} on {}", ctx.height, ctx.chain_id);
        self.apply(store, tx)
    }

    fn init_state(
        &self,
        span: &Span,
        store: &mut dyn KvStore,
        module: &str,
        key: &str,
        value: &str,
    ) -> Result<String, AppError> {
        let _entered = span.enter();
        if module != KV_MODULE {
            return Err(AppError::UnknownRequest(format!("unknown module: {}", module)));
        }
        store.set(kv_key(key), value.as_bytes().to_vec());
        Ok(format!("Seeded {}/{}", module, key))
    }
}
