//! The three isolated views of application state.
//!
//! - `committed`: immutable snapshot, replaced as a whole by [`Store::commit`].
//! - `append`: working copy for the block being applied (consensus connection only).
//! - `check`: working copy for mempool validation, reset after every commit.
//!
//! Each view sits behind its own lock and no method holds one view's lock
//! while acquiring another's, except `commit`, which takes them in the fixed
//! order append → committed → check.

use super::kv::{KvStore, MemKv};
use super::merkle::{root_hash, InclusionProof, Sha256Hash};
use crate::error::{AppError, ResultCode};
use crate::persistence::{InMemoryPersistence, StatePersistence};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Height and app hash of a committed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub height: u64,
    pub app_hash: Sha256Hash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    pub path: String,
    pub data: Vec<u8>,
    pub height: u64,
    pub prove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseQuery {
    pub code: ResultCode,
    pub log: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub proof: Option<Vec<u8>>,
    pub height: u64,
}

impl ResponseQuery {
    pub fn from_error(err: &AppError) -> Self {
        Self {
            code: err.code(),
            log: err.to_string(),
            key: Vec::new(),
            value: Vec::new(),
            proof: None,
            height: 0,
        }
    }
}

struct Committed {
    state: Arc<MemKv>,
    info: CommitInfo,
}

pub struct Store {
    committed: RwLock<Committed>,
    append: Mutex<MemKv>,
    check: Mutex<MemKv>,
    persistence: Box<dyn StatePersistence>,
}

impl Store {
    /// Opens a store over the given backend, resuming from its latest commit.
    pub fn open(persistence: Box<dyn StatePersistence>) -> Result<Self, AppError> {
        let (info, state) = match persistence.load_latest()? {
            Some((info, state)) => {
                info!(
                    "Resuming store at height {} (app_hash = {})",
                    info.height,
                    hex::encode(info.app_hash)
                );
                (info, state)
            }
            None => {
                let state = MemKv::new();
                let info = CommitInfo {
                    height: 0,
                    app_hash: root_hash(&state),
                };
                (info, state)
            }
        };

        Ok(Self {
            append: Mutex::new(state.clone()),
            check: Mutex::new(state.clone()),
            committed: RwLock::new(Committed {
                state: Arc::new(state),
                info,
            }),
            persistence,
        })
    }

    /// Ephemeral store starting from empty state.
    pub fn in_memory() -> Self {
        // The in-memory backend never fails to load.
        Self::open(Box::new(InMemoryPersistence::new()))
            .unwrap_or_else(|_| unreachable!("in-memory persistence has no load path errors"))
    }

    /// Last committed height and app hash.
    pub fn info(&self) -> CommitInfo {
        self.committed.read().info.clone()
    }

    /// Read-only snapshot of the last commit. Holding it never blocks a commit.
    pub fn committed(&self) -> Arc<MemKv> {
        self.committed.read().state.clone()
    }

    /// Exclusive access to the block working copy.
    pub fn append(&self) -> MutexGuard<'_, MemKv> {
        self.append.lock()
    }

    /// Exclusive access to the mempool working copy.
    pub fn check(&self) -> MutexGuard<'_, MemKv> {
        self.check.lock()
    }

    /// Promotes the append view to committed, persists it and resets the
    /// check view. Any failure is reported as [`AppError::StoreFatal`] and
    /// leaves the previous snapshot in place.
    pub fn commit(&self) -> Result<CommitInfo, AppError> {
        let append = self.append.lock();
        let snapshot = append.clone();
        let info = CommitInfo {
            height: self.committed.read().info.height + 1,
            app_hash: root_hash(&snapshot),
        };

        self.persistence
            .save_commit(&info, &snapshot)
            .map_err(|e| AppError::StoreFatal(format!("commit at height {}: {}", info.height, e)))?;

        let snapshot = Arc::new(snapshot);
        {
            let mut committed = self.committed.write();
            committed.state = snapshot.clone();
            committed.info = info.clone();
        }
        *self.check.lock() = (*snapshot).clone();
        drop(append);

        debug!(
            "Committed height {} with {} entries",
            info.height,
            snapshot.len()
        );
        Ok(info)
    }

    /// Read path against the committed snapshot.
    pub fn query(&self, request: &RequestQuery) -> ResponseQuery {
        let (state, info) = {
            let committed = self.committed.read();
            (committed.state.clone(), committed.info.clone())
        };

        match request.path.as_str() {
            "" | "/key" => {}
            other => {
                return ResponseQuery::from_error(&AppError::UnknownRequest(format!(
                    "unexpected query path: {}",
                    other
                )))
            }
        }

        if request.height != 0 && request.height != info.height {
            return ResponseQuery::from_error(&AppError::UnknownRequest(format!(
                "only the latest height ({}) can be queried, got {}",
                info.height, request.height
            )));
        }

        let value = state.get(&request.data);
        let proof = if request.prove {
            match InclusionProof::build(&state, &request.data).map(|p| p.to_bytes()) {
                Some(Ok(bytes)) => Some(bytes),
                Some(Err(e)) => return ResponseQuery::from_error(&e),
                None => None,
            }
        } else {
            None
        };

        ResponseQuery {
            code: ResultCode::Ok,
            log: if value.is_some() { "exists" } else { "does not exist" }.to_string(),
            key: request.data.clone(),
            value: value.unwrap_or_default(),
            proof,
            height: info.height,
        }
    }
}
