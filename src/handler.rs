//! The application-defined transaction handler and its call context

use crate::error::AppError;
use crate::store::KvStore;
use crate::transaction::TxEnvelope;
use crate::validators::ValidatorUpdate;
use tracing::Span;

/// Which connection a dispatch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Check,
    Deliver,
}

impl Mode {
    /// Label used for the `call` field of the per-call span.
    pub fn call_name(self) -> &'static str {
        match self {
            Mode::Check => "checktx",
            Mode::Deliver => "delivertx",
        }
    }
}

/// Arguments bundled for one handler call. Built fresh every time.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub chain_id: String,
    pub height: u64,
    pub span: Span,
}

impl CallContext {
    pub fn new(chain_id: String, height: u64, mode: Mode) -> Self {
        let span = tracing::debug_span!(
            "tx",
            call = mode.call_name(),
            chain_id = %chain_id,
            height
        );
        Self {
            chain_id,
            height,
            span,
        }
    }
}

/// What a handler returns for an accepted transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerResponse {
    pub data: Vec<u8>,
    pub log: String,
    pub diff: Vec<ValidatorUpdate>,
}

/// Business rules live behind this trait. Implementations are responsible
/// for their own atomicity within the view they are given: a returned error
/// should leave the view as it was.
pub trait Handler: Send + Sync {
    fn check_tx(
        &self,
        ctx: &CallContext,
        store: &mut dyn KvStore,
        tx: &TxEnvelope,
    ) -> Result<HandlerResponse, AppError>;

    fn deliver_tx(
        &self,
        ctx: &CallContext,
        store: &mut dyn KvStore,
        tx: &TxEnvelope,
    ) -> Result<HandlerResponse, AppError>;

    /// Pre-genesis option for a non-base module. Returns a log line.
    fn init_state(
        &self,
        span: &Span,
        store: &mut dyn KvStore,
        module: &str,
        key: &str,
        value: &str,
    ) -> Result<String, AppError>;
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn check_tx(
        &self,
        ctx: &CallContext,
        store: &mut dyn KvStore,
        tx: &TxEnvelope,
    ) -> Result<HandlerResponse, AppError> {
        (**self).check_tx(ctx, store, tx)
    }

    fn deliver_tx(
        &self,
        ctx: &CallContext,
        store: &mut dyn KvStore,
        tx: &TxEnvelope,
    ) -> Result<HandlerResponse, AppError> {
        (**self).deliver_tx(ctx, store, tx)
    }

    fn init_state(
        &self,
        span: &Span,
        store: &mut dyn KvStore,
        module: &str,
        key: &str,
        value: &str,
    ) -> Result<String, AppError> {
        (**self).init_state(span, store, module, key, value)
    }
}
