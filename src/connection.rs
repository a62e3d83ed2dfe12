//! The two logical connections onto one shared [`Application`].
//!
//! The consensus connection serves every lifecycle call in order; the
//! mempool connection serves CheckTx (and read-only queries) and may run on
//! another thread at the same time.

use crate::abci::{Application, Request, Response, ResponseCommit};
use crate::error::AppError;
use std::sync::Arc;
use tracing::error;

/// Invoked when the store cannot commit. Must not return.
pub type FatalHook = fn(&AppError) -> !;

/// Default [`FatalHook`]: log and abort the process without unwinding.
pub fn abort_process(err: &AppError) -> ! {
    error!("Unrecoverable commit failure, aborting: {}", err);
    std::process::abort()
}

pub struct ConsensusConnection<A> {
    app: Arc<A>,
    on_fatal: FatalHook,
}

impl<A: Application> ConsensusConnection<A> {
    pub fn new(app: Arc<A>) -> Self {
        Self::with_fatal_hook(app, abort_process)
    }

    pub fn with_fatal_hook(app: Arc<A>, on_fatal: FatalHook) -> Self {
        Self { app, on_fatal }
    }

    /// Commits, or hands the failure to the fatal hook. Never returns an error.
    pub fn commit(&self) -> ResponseCommit {
        match self.app.commit() {
            Ok(response) => response,
            Err(err) => (self.on_fatal)(&err),
        }
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::Info => Response::Info(self.app.info()),
            Request::InitState { key, value } => {
                Response::InitState(self.app.init_state(&key, &value))
            }
            Request::InitChain { validators } => {
                self.app.init_chain(&validators);
                Response::InitChain
            }
            Request::BeginBlock { hash, header } => {
                self.app.begin_block(&hash, &header);
                Response::BeginBlock
            }
            Request::DeliverTx(raw) => Response::DeliverTx(self.app.deliver_tx(&raw)),
            Request::EndBlock { height } => Response::EndBlock(self.app.end_block(height)),
            Request::Commit => Response::Commit(self.commit()),
            Request::Query(query) => Response::Query(self.app.query(&query)),
            other @ Request::CheckTx(_) => Response::Exception(format!(
                "{} is not served on the consensus connection",
                other.name()
            )),
        }
    }
}

pub struct MempoolConnection<A> {
    app: Arc<A>,
}

impl<A: Application> MempoolConnection<A> {
    pub fn new(app: Arc<A>) -> Self {
        Self { app }
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::CheckTx(raw) => Response::CheckTx(self.app.check_tx(&raw)),
            Request::Query(query) => Response::Query(self.app.query(&query)),
            other => Response::Exception(format!(
                "{} is not served on the mempool connection",
                other.name()
            )),
        }
    }
}
