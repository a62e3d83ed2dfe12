//! Block lifecycle state machine: height, chain identity and the pending
//! validator changes of the block in flight.

use crate::abci::{Header, ResponseCommit, ResponseEndBlock, ResponseInfo};
use crate::chain_identity::{ChainIdentity, CHAIN_KEY, MODULE_NAME_BASE};
use crate::error::AppError;
use crate::handler::{CallContext, Mode};
use crate::store::Store;
use crate::validators::{ValidatorChangeSet, ValidatorUpdate};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const APP_NAME: &str = "Basecoin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Ready,
    InBlock,
}

/// Splits an option key at the first `/`. Keys without one belong to the
/// base module.
pub fn split_key(key: &str) -> (&str, &str) {
    match key.split_once('/') {
        Some((module, rest)) => (module, rest),
        None => (MODULE_NAME_BASE, key),
    }
}

pub struct BlockLifecycleController {
    store: Arc<Store>,
    identity: ChainIdentity,
    pending: ValidatorChangeSet,
    height: u64,
    phase: Phase,
    version: String,
}

impl BlockLifecycleController {
    pub fn new(store: Arc<Store>, version: impl Into<String>) -> Self {
        Self::with_change_set(store, version, ValidatorChangeSet::new())
    }

    pub fn with_change_set(
        store: Arc<Store>,
        version: impl Into<String>,
        pending: ValidatorChangeSet,
    ) -> Self {
        Self {
            store,
            identity: ChainIdentity::new(),
            pending,
            height: 0,
            phase: Phase::Uninitialized,
            version: version.into(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Chain id as of the last commit.
    pub fn chain_id(&self) -> String {
        self.identity.get(&*self.store.committed())
    }

    pub fn pending_validators(&self) -> &[ValidatorUpdate] {
        self.pending.pending()
    }

    pub fn info(&mut self) -> ResponseInfo {
        let committed = self.store.info();
        self.height = committed.height;
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::Ready;
        }
        ResponseInfo {
            data: format!("{} v{}", APP_NAME, self.version),
            last_block_height: committed.height,
            last_block_app_hash: committed.app_hash,
        }
    }

    /// Handles a pre-genesis option addressed to the base module.
    pub fn init_base_option(&mut self, key: &str, value: &str) -> Result<String, AppError> {
        if key != CHAIN_KEY {
            return Err(AppError::UnknownOption(key.to_string()));
        }

        let current = self.chain_id();
        if !current.is_empty() && current != value {
            return Err(AppError::ConfigError(format!(
                "chain_id is already bound to {}",
                current
            )));
        }

        self.identity.bind(&mut *self.store.append(), value);
        info!("Bound chain_id = {}", value);
        Ok("Success".to_string())
    }

    pub fn init_chain(&mut self, validators: &[ValidatorUpdate]) {
        info!("InitChain with {} genesis validators", validators.len());
    }

    pub fn begin_block(&mut self, hash: &[u8], header: &Header) {
        if self.phase == Phase::InBlock {
            warn!("BeginBlock while block {} is still open", self.height);
        }
        self.height += 1;
        self.phase = Phase::InBlock;

        if header.height != 0 && header.height != self.height {
            warn!(
                "Header height {} differs from local height {}",
                header.height, self.height
            );
        }
        debug!("BeginBlock {} (hash = {})", self.height, hex::encode(hash));
    }

    /// Fresh per-call context at the current height.
    pub fn context(&self, mode: Mode) -> CallContext {
        CallContext::new(self.chain_id(), self.height, mode)
    }

    pub fn record_validator_changes(&mut self, diff: Vec<ValidatorUpdate>) {
        if !diff.is_empty() {
            self.pending.merge(diff);
        }
    }

    pub fn end_block(&mut self, height: u64) -> ResponseEndBlock {
        if height != self.height {
            warn!("EndBlock for height {} at local height {}", height, self.height);
        }
        self.phase = Phase::Ready;
        let diffs = self.pending.drain();
        debug!("EndBlock {} with {} validator changes", self.height, diffs.len());
        ResponseEndBlock { diffs }
    }

    /// Promotes the append view. The caller must treat an error as fatal.
    pub fn commit(&mut self) -> Result<ResponseCommit, AppError> {
        let committed = self.store.commit()?;
        if committed.height != self.height {
            warn!(
                "Store committed height {} while lifecycle is at {}",
                committed.height, self.height
            );
        }
        self.phase = Phase::Ready;
        info!(
            "Committed block {} (app_hash = {})",
            committed.height,
            hex::encode(committed.app_hash)
        );
        Ok(ResponseCommit {
            height: committed.height,
            app_hash: committed.app_hash,
        })
    }
}
