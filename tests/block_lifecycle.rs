//! Integration tests driving the application through full block lifecycles

use basecoin::abci::{Application, Header, Request, Response};
use basecoin::app::BaseApp;
use basecoin::connection::ConsensusConnection;
use basecoin::error::{AppError, ResultCode};
use basecoin::handler::{CallContext, Handler, HandlerResponse};
use basecoin::kvstore::KvStoreHandler;
use basecoin::lifecycle::Phase;
use basecoin::persistence::SqliteStateDb;
use basecoin::store::{InclusionProof, KvStore, RequestQuery, Store};
use basecoin::transaction::TxEnvelope;
use basecoin::validators::ValidatorUpdate;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::Span;

type App = BaseApp<KvStoreHandler>;

fn new_app() -> Arc<App> {
    Arc::new(BaseApp::new(KvStoreHandler::new(), Arc::new(Store::in_memory())))
}

fn fatal_panics(err: &AppError) -> ! {
    panic!("fatal: {}", err)
}

fn encode(tx: TxEnvelope) -> Vec<u8> {
    tx.encode().expect("encodable")
}

/// Runs one block through the consensus connection and returns its validator diff.
fn run_block(conn: &ConsensusConnection<App>, app: &App, txs: Vec<Vec<u8>>) -> Vec<ValidatorUpdate> {
    let height = app.controller().height() + 1;
    conn.handle(Request::BeginBlock {
        hash: vec![height as u8; 32],
        header: Header {
            height,
            ..Default::default()
        },
    });
    for raw in txs {
        conn.handle(Request::DeliverTx(raw));
    }
    let diffs = match conn.handle(Request::EndBlock { height }) {
        Response::EndBlock(end) => end.diffs,
        other => panic!("unexpected {:?}", other),
    };
    conn.commit();
    diffs
}

#[test]
fn test_chain_id_survives_commits() {
    let app = new_app();
    let conn = ConsensusConnection::with_fatal_hook(app.clone(), fatal_panics);

    conn.handle(Request::Info);
    assert!(matches!(
        conn.handle(Request::InitState {
            key: "base/chain_id".to_string(),
            value: "test-chain".to_string()
        }),
        Response::InitState(log) if log == "Success"
    ));
    conn.handle(Request::InitChain { validators: Vec::new() });

    run_block(&conn, &app, Vec::new());
    assert_eq!(app.chain_id(), "test-chain");

    run_block(&conn, &app, vec![encode(KvStoreHandler::set_tx("a", "1"))]);
    assert_eq!(app.chain_id(), "test-chain");
}

#[test]
fn test_init_state_results() {
    let app = new_app();
    assert_eq!(app.init_state("chain_id", "test-chain"), "Success");
    assert_eq!(
        app.init_state("base/difficulty", "3"),
        "Error: unknown base option: difficulty"
    );
    assert_eq!(app.init_state("kv/greeting", "hello"), "Seeded kv/greeting");
    assert_eq!(
        app.init_state("oracle/price", "10"),
        "Error: Unknown request: unknown module: oracle"
    );

    app.commit().unwrap();
    let response = app.query(&RequestQuery {
        data: b"kv/greeting".to_vec(),
        ..Default::default()
    });
    assert_eq!(response.value, b"hello".to_vec());
}

#[test]
fn test_same_validator_twice_in_one_block() {
    let app = new_app();
    let conn = ConsensusConnection::with_fatal_hook(app.clone(), fatal_panics);
    conn.handle(Request::Info);

    let diffs = run_block(
        &conn,
        &app,
        vec![
            encode(KvStoreHandler::validator_tx(b"pubkeyA", 5).unwrap()),
            encode(KvStoreHandler::validator_tx(b"pubkeyA", 9).unwrap()),
        ],
    );
    assert_eq!(diffs, vec![ValidatorUpdate::new(b"pubkeyA".to_vec(), 9)]);

    let next = run_block(&conn, &app, Vec::new());
    assert!(next.is_empty());
}

#[test]
fn test_height_advances_by_one_per_block() {
    let app = new_app();
    let conn = ConsensusConnection::with_fatal_hook(app.clone(), fatal_panics);
    conn.handle(Request::Info);

    for expected in 1..=4u64 {
        let before = app.controller().height();
        conn.handle(Request::BeginBlock {
            hash: Vec::new(),
            header: Header::default(),
        });
        assert_eq!(app.controller().height(), before + 1);
        assert_eq!(app.controller().phase(), Phase::InBlock);
        conn.handle(Request::EndBlock { height: expected });
        let commit = conn.commit();
        assert_eq!(commit.height, expected);
    }

    match conn.handle(Request::Info) {
        Response::Info(info) => assert_eq!(info.last_block_height, 4),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_malformed_tx_changes_nothing() {
    let app = new_app();
    app.info();
    app.begin_block(&[], &Header::default());

    let garbage: [&[u8]; 3] = [&[], &[0xde, 0xad], &[0xff; 40]];
    for raw in garbage {
        let deliver = app.deliver_tx(raw);
        let check = app.check_tx(raw);
        assert_eq!(deliver.code, ResultCode::EncodingError);
        assert_eq!(check.code, ResultCode::EncodingError);
    }

    assert!(app.store().append().is_empty());
    assert!(app.store().check().is_empty());
    assert!(app.end_block(1).diffs.is_empty());
}

#[test]
fn test_handler_error_reported_not_fatal() {
    let app = new_app();
    app.info();
    app.begin_block(&[], &Header::default());

    let result = app.deliver_tx(&encode(KvStoreHandler::remove_tx("ghost")));
    assert_eq!(result.code, ResultCode::UnknownRequest);
    assert_eq!(result.log, "no such key: ghost");

    let ok = app.deliver_tx(&encode(KvStoreHandler::set_tx("a", "1")));
    assert!(ok.is_ok());
    assert_eq!(ok.log, "set a");
}

#[test]
fn test_check_tx_never_touches_validator_changes() {
    let app = new_app();
    app.info();
    app.begin_block(&[], &Header::default());
    app.deliver_tx(&encode(KvStoreHandler::validator_tx(b"A", 1).unwrap()));
    let before = app.controller().pending_validators().to_vec();

    for power in 0..10 {
        let result = app.check_tx(&encode(KvStoreHandler::validator_tx(b"B", power).unwrap()));
        assert!(result.is_ok());
        app.check_tx(&[0x00]);
    }

    assert_eq!(app.controller().pending_validators(), before.as_slice());
    assert_eq!(app.end_block(1).diffs, before);
}

#[test]
fn test_check_and_append_views_are_isolated() {
    let app = new_app();
    app.info();
    app.begin_block(&[], &Header::default());

    app.check_tx(&encode(KvStoreHandler::set_tx("mempool", "x")));
    app.deliver_tx(&encode(KvStoreHandler::set_tx("block", "y")));

    assert!(app.store().check().has(b"kv/mempool"));
    assert!(!app.store().check().has(b"kv/block"));
    assert!(app.store().append().has(b"kv/block"));
    assert!(!app.store().append().has(b"kv/mempool"));

    app.end_block(1);
    app.commit().unwrap();

    // The check view is rebuilt from the new commit.
    assert!(app.store().check().has(b"kv/block"));
    assert!(!app.store().check().has(b"kv/mempool"));
}

#[test]
fn test_empty_query_is_encoding_error() {
    let app = new_app();
    let response = app.query(&RequestQuery::default());
    assert_eq!(response.code, ResultCode::EncodingError);
    assert_eq!(response.log, "Query cannot be zero length");
}

#[test]
fn test_query_proof_matches_app_hash() {
    let app = new_app();
    let conn = ConsensusConnection::with_fatal_hook(app.clone(), fatal_panics);
    conn.handle(Request::Info);
    run_block(
        &conn,
        &app,
        vec![
            encode(KvStoreHandler::set_tx("a", "1")),
            encode(KvStoreHandler::set_tx("b", "2")),
            encode(KvStoreHandler::set_tx("c", "3")),
        ],
    );

    let info = app.info();
    let response = app.query(&RequestQuery {
        path: "/key".to_string(),
        data: b"kv/b".to_vec(),
        height: info.last_block_height,
        prove: true,
    });
    assert_eq!(response.code, ResultCode::Ok);
    let proof = InclusionProof::from_bytes(&response.proof.unwrap()).unwrap();
    assert!(proof.verify(b"kv/b", b"2", &info.last_block_app_hash));
}

#[test]
fn test_restart_from_sqlite() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");
    let path = path.to_str().unwrap();

    let committed = {
        let store = Store::open(Box::new(SqliteStateDb::open(path).unwrap())).unwrap();
        let app = Arc::new(BaseApp::new(KvStoreHandler::new(), Arc::new(store)));
        let conn = ConsensusConnection::with_fatal_hook(app.clone(), fatal_panics);
        conn.handle(Request::Info);
        app.init_state("base/chain_id", "test-chain");
        run_block(&conn, &app, vec![encode(KvStoreHandler::set_tx("a", "1"))]);
        run_block(&conn, &app, vec![encode(KvStoreHandler::set_tx("b", "2"))]);
        app.info()
    };

    let store = Store::open(Box::new(SqliteStateDb::open(path).unwrap())).unwrap();
    let app = BaseApp::new(KvStoreHandler::new(), Arc::new(store));
    let info = app.info();
    assert_eq!(info, committed);
    assert_eq!(info.last_block_height, 2);
    assert_eq!(app.chain_id(), "test-chain");

    app.begin_block(&[], &Header::default());
    assert_eq!(app.controller().height(), 3);
}

/// Records `(call, chain_id, height)` for every check and deliver.
#[derive(Default)]
struct RecordingHandler {
    calls: Arc<Mutex<Vec<(&'static str, String, u64)>>>,
}

impl RecordingHandler {
    fn record(&self, call: &'static str, ctx: &CallContext) -> Result<HandlerResponse, AppError> {
        self.calls
            .lock()
            .unwrap()
            .push((call, ctx.chain_id.clone(), ctx.height));
        Ok(HandlerResponse::default())
    }
}

impl Handler for RecordingHandler {
    fn check_tx(
        &self,
        ctx: &CallContext,
        _: &mut dyn KvStore,
        _: &TxEnvelope,
    ) -> Result<HandlerResponse, AppError> {
        self.record("check", ctx)
    }

    fn deliver_tx(
        &self,
        ctx: &CallContext,
        _: &mut dyn KvStore,
        _: &TxEnvelope,
    ) -> Result<HandlerResponse, AppError> {
        self.record("deliver", ctx)
    }

    fn init_state(
        &self,
        _: &Span,
        _: &mut dyn KvStore,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<String, AppError> {
        Ok(String::new())
    }
}

#[test]
fn test_handler_sees_block_height_and_chain_id() {
    let handler = RecordingHandler::default();
    let calls = handler.calls.clone();
    let app = BaseApp::new(handler, Arc::new(Store::in_memory()));
    app.info();
    assert_eq!(app.init_state("base/chain_id", "test-chain"), "Success");

    let raw = encode(TxEnvelope::new("any/op", b"x".to_vec()));
    for height in 1..=2u64 {
        app.begin_block(&[], &Header::default());
        app.deliver_tx(&raw);
        app.check_tx(&raw);
        app.end_block(height);
        app.commit().unwrap();
    }

    // The chain id is only visible once the block that bound it is committed.
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            ("deliver", String::new(), 1),
            ("check", String::new(), 1),
            ("deliver", "test-chain".to_string(), 2),
            ("check", "test-chain".to_string(), 2),
        ]
    );
}
