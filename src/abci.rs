//! Application protocol surface: request/response types and the
//! [`Application`] trait the connections drive.

use crate::error::{AppError, ResultCode};
use crate::store::{RequestQuery, ResponseQuery, Sha256Hash};
use crate::validators::ValidatorUpdate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub chain_id: String,
    pub height: u64,
    /// Block time in unix milliseconds.
    pub time: i64,
    pub num_txs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub data: String,
    pub last_block_height: u64,
    pub last_block_app_hash: Sha256Hash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEndBlock {
    pub diffs: Vec<ValidatorUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCommit {
    pub height: u64,
    pub app_hash: Sha256Hash,
}

/// Result of CheckTx / DeliverTx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub code: ResultCode,
    pub data: Vec<u8>,
    pub log: String,
}

impl TxResult {
    pub fn ok(data: Vec<u8>, log: String) -> Self {
        Self {
            code: ResultCode::Ok,
            data,
            log,
        }
    }

    pub fn from_error(err: &AppError) -> Self {
        Self {
            code: err.code(),
            data: Vec::new(),
            log: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

/// Everything the consensus engine and the mempool can ask of the application.
///
/// Methods take `&self`: one instance is shared by both connections, and
/// implementations synchronise internally.
pub trait Application: Send + Sync {
    fn info(&self) -> ResponseInfo;

    /// Pre-genesis option (formerly SetOption). Key grammar `module/subkey`.
    fn init_state(&self, key: &str, value: &str) -> String;

    fn init_chain(&self, validators: &[ValidatorUpdate]);

    fn begin_block(&self, hash: &[u8], header: &Header);

    fn deliver_tx(&self, raw: &[u8]) -> TxResult;

    fn check_tx(&self, raw: &[u8]) -> TxResult;

    fn end_block(&self, height: u64) -> ResponseEndBlock;

    /// Only ever fails with [`AppError::StoreFatal`].
    fn commit(&self) -> Result<ResponseCommit, AppError>;

    fn query(&self, request: &RequestQuery) -> ResponseQuery;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Info,
    InitState { key: String, value: String },
    InitChain { validators: Vec<ValidatorUpdate> },
    BeginBlock { hash: Vec<u8>, header: Header },
    DeliverTx(Vec<u8>),
    CheckTx(Vec<u8>),
    EndBlock { height: u64 },
    Commit,
    Query(RequestQuery),
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Info => "info",
            Request::InitState { .. } => "init_state",
            Request::InitChain { .. } => "init_chain",
            Request::BeginBlock { .. } => "begin_block",
            Request::DeliverTx(_) => "deliver_tx",
            Request::CheckTx(_) => "check_tx",
            Request::EndBlock { .. } => "end_block",
            Request::Commit => "commit",
            Request::Query(_) => "query",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Info(ResponseInfo),
    InitState(String),
    InitChain,
    BeginBlock,
    DeliverTx(TxResult),
    CheckTx(TxResult),
    EndBlock(ResponseEndBlock),
    Commit(ResponseCommit),
    Query(ResponseQuery),
    /// The request was sent on a connection that does not serve it.
    Exception(String),
}
