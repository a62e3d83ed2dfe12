//! The application: lifecycle controller plus transaction handler, shared by
//! the consensus and mempool connections.

use crate::abci::{
    Application, Header, ResponseCommit, ResponseEndBlock, ResponseInfo, TxResult,
};
use crate::chain_identity::MODULE_NAME_BASE;
use crate::dispatcher::TransactionDispatcher;
use crate::error::AppError;
use crate::handler::{Handler, Mode};
use crate::lifecycle::{split_key, BlockLifecycleController};
use crate::query::QueryGateway;
use crate::store::{RequestQuery, ResponseQuery, Store};
use crate::transaction::tx_hash_str;
use crate::validators::ValidatorUpdate;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BaseApp<H> {
    controller: Mutex<BlockLifecycleController>,
    dispatcher: TransactionDispatcher<H>,
    gateway: QueryGateway,
    store: Arc<Store>,
}

impl<H: Handler> BaseApp<H> {
    pub fn new(handler: H, store: Arc<Store>) -> Self {
        Self::with_controller(
            handler,
            store.clone(),
            BlockLifecycleController::new(store, env!("CARGO_PKG_VERSION")),
        )
    }

    pub fn with_controller(
        handler: H,
        store: Arc<Store>,
        controller: BlockLifecycleController,
    ) -> Self {
        Self {
            controller: Mutex::new(controller),
            dispatcher: TransactionDispatcher::new(handler),
            gateway: QueryGateway::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Direct access to lifecycle state, for inspection.
    pub fn controller(&self) -> MutexGuard<'_, BlockLifecycleController> {
        self.controller.lock()
    }

    pub fn chain_id(&self) -> String {
        self.controller.lock().chain_id()
    }
}

impl<H: Handler> Application for BaseApp<H> {
    fn info(&self) -> ResponseInfo {
        self.controller.lock().info()
    }

    fn init_state(&self, key: &str, value: &str) -> String {
        let (module, key) = split_key(key);

        if module == MODULE_NAME_BASE {
            return match self.controller.lock().init_base_option(key, value) {
                Ok(log) => log,
                Err(err) => {
                    warn!("Rejected base option {}: {}", key, err);
                    format!("Error: {}", err)
                }
            };
        }

        let span = tracing::info_span!("init_state", module, key);
        let mut view = self.store.append();
        match self
            .dispatcher
            .handler()
            .init_state(&span, &mut *view, module, key, value)
        {
            Ok(log) => log,
            Err(err) => format!("Error: {}", err),
        }
    }

    fn init_chain(&self, validators: &[ValidatorUpdate]) {
        self.controller.lock().init_chain(validators);
    }

    fn begin_block(&self, hash: &[u8], header: &Header) {
        self.controller.lock().begin_block(hash, header);
    }

    fn deliver_tx(&self, raw: &[u8]) -> TxResult {
        let tx = match self.dispatcher.decode(raw) {
            Ok(tx) => tx,
            Err(err) => {
                debug!("DeliverTx {} undecodable: {}", tx_hash_str(raw), err);
                return TxResult::from_error(&err);
            }
        };

        // Controller lock is released before dispatch and re-taken only to
        // record the diff.
        let ctx = self.controller.lock().context(Mode::Deliver);
        let mut result = {
            let mut view = self.store.append();
            self.dispatcher.dispatch(&tx, &mut *view, Mode::Deliver, &ctx)
        };

        if result.is_ok() {
            self.controller
                .lock()
                .record_validator_changes(std::mem::take(&mut result.validator_diff));
        }
        result.into_tx_result()
    }

    fn check_tx(&self, raw: &[u8]) -> TxResult {
        let tx = match self.dispatcher.decode(raw) {
            Ok(tx) => tx,
            Err(err) => {
                debug!("CheckTx {} undecodable: {}", tx_hash_str(raw), err);
                return TxResult::from_error(&err);
            }
        };

        // Only height and chain id are read from the controller; the lock is
        // released before the check view is taken.
        let ctx = self.controller.lock().context(Mode::Check);
        let mut view = self.store.check();
        self.dispatcher
            .dispatch(&tx, &mut *view, Mode::Check, &ctx)
            .into_tx_result()
    }

    fn end_block(&self, height: u64) -> ResponseEndBlock {
        self.controller.lock().end_block(height)
    }

    fn commit(&self) -> Result<ResponseCommit, AppError> {
        self.controller.lock().commit()
    }

    fn query(&self, request: &RequestQuery) -> ResponseQuery {
        self.gateway.query(request)
    }
}
