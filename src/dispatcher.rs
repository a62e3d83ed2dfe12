//! Routes decoded transactions to the handler for check or deliver semantics

use crate::abci::TxResult;
use crate::error::AppError;
use crate::handler::{CallContext, Handler, Mode};
use crate::store::KvStore;
use crate::transaction::TxEnvelope;
use crate::validators::ValidatorUpdate;
use tracing::debug;

/// Outcome of one dispatch. Handler errors are carried in `error`, never raised.
#[derive(Debug, Clone, Default)]
pub struct DispatchResult {
    pub data: Vec<u8>,
    pub log: String,
    pub validator_diff: Vec<ValidatorUpdate>,
    pub error: Option<AppError>,
}

impl DispatchResult {
    pub fn from_error(err: AppError) -> Self {
        Self {
            error: Some(err),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_tx_result(self) -> TxResult {
        match self.error {
            Some(err) => TxResult::from_error(&err),
            None => TxResult::ok(self.data, self.log),
        }
    }
}

pub struct TransactionDispatcher<H> {
    handler: H,
}

impl<H: Handler> TransactionDispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn decode(&self, raw: &[u8]) -> Result<TxEnvelope, AppError> {
        TxEnvelope::decode(raw)
    }

    pub fn dispatch(
        &self,
        tx: &TxEnvelope,
        view: &mut dyn KvStore,
        mode: Mode,
        ctx: &CallContext,
    ) -> DispatchResult {
        let _entered = ctx.span.enter();
        let outcome = match mode {
            Mode::Check => self.handler.check_tx(ctx, view, tx),
            Mode::Deliver => self.handler.deliver_tx(ctx, view, tx),
        };

        match outcome {
            Ok(response) => {
                debug!(route = %tx.route, diffs = response.diff.len(), "accepted");
                DispatchResult {
                    data: response.data,
                    log: response.log,
                    validator_diff: response.diff,
                    error: None,
                }
            }
            Err(err) => {
                debug!(route = %tx.route, code = err.code().as_u32(), "rejected: {}", err);
                DispatchResult::from_error(err)
            }
        }
    }
}
