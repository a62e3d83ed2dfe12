#![forbid(unsafe_code)]
//! Replays blocks of transactions through the consensus and mempool
//! connections using the demo key/value handler.

use basecoin::abci::{Application, Header, Request, Response};
use basecoin::app::BaseApp;
use basecoin::config::{load_config, Config};
use basecoin::connection::{ConsensusConnection, MempoolConnection};
use basecoin::kvstore::KvStoreHandler;
use basecoin::store::{RequestQuery, Store};
use clap::{Parser, Subcommand};
use colored::*;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

type App = BaseApp<KvStoreHandler>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replays a JSON block file: [{"txs": ["<hex>", ...]}, ...]
    Replay {
        blocks: PathBuf,
    },
    /// Generates and replays a few demo blocks
    Demo {
        #[arg(long, default_value_t = 3)]
        blocks: u64,
    },
    /// Prints the last committed height and app hash
    Info,
    /// Looks up a raw key in the committed state
    Query {
        key: String,
        #[arg(long)]
        prove: bool,
    },
}

#[derive(Debug, Deserialize)]
struct BlockFile {
    txs: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level()?)
        .init();

    let store = Arc::new(Store::open(config.open_persistence()?)?);
    let app = Arc::new(BaseApp::new(KvStoreHandler::new(), store));

    match cli.command {
        Commands::Replay { blocks } => {
            let content = std::fs::read_to_string(&blocks)
                .map_err(|e| format!("Failed to read {}: {}", blocks.display(), e))?;
            let parsed: Vec<BlockFile> = serde_json::from_str(&content)?;
            let mut decoded = Vec::with_capacity(parsed.len());
            for block in parsed {
                let txs = block
                    .txs
                    .iter()
                    .map(hex::decode)
                    .collect::<Result<Vec<_>, _>>()?;
                decoded.push(txs);
            }
            run(app, &config, decoded).await?;
        }
        Commands::Demo { blocks } => {
            run(app, &config, demo_blocks(blocks)?).await?;
        }
        Commands::Info => {
            let info = app.info();
            println!("{}", info.data.bright_cyan().bold());
            println!("  height:   {}", info.last_block_height.to_string().bright_white());
            println!("  app hash: {}", hex::encode(info.last_block_app_hash).bright_white());
        }
        Commands::Query { key, prove } => {
            let response = app.query(&RequestQuery {
                data: key.into_bytes(),
                prove,
                ..Default::default()
            });
            if response.code.is_ok() {
                println!("{} {}", "✅".green(), response.log);
                println!("  value: {}", String::from_utf8_lossy(&response.value));
                if let Some(proof) = response.proof {
                    println!("  proof: {}", hex::encode(proof));
                }
            } else {
                println!("{} {:?}: {}", "❌".red(), response.code, response.log);
            }
        }
    }

    Ok(())
}

fn demo_blocks(count: u64) -> Result<Vec<Vec<Vec<u8>>>, Box<dyn std::error::Error>> {
    let mut blocks = Vec::new();
    for n in 0..count {
        blocks.push(vec![
            KvStoreHandler::set_tx(&format!("block-{}", n), &format!("value-{}", n)).encode()?,
            KvStoreHandler::validator_tx(b"validator-a", n + 1)?.encode()?,
            KvStoreHandler::validator_tx(b"validator-a", n + 10)?.encode()?,
            vec![0xde, 0xad],
        ]);
    }
    Ok(blocks)
}

async fn run(
    app: Arc<App>,
    config: &Config,
    blocks: Vec<Vec<Vec<u8>>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let consensus = ConsensusConnection::new(app.clone());
    let mempool = Arc::new(MempoolConnection::new(app.clone()));

    let info = consensus.handle(Request::Info);
    let start_height = match info {
        Response::Info(info) => info.last_block_height,
        _ => 0,
    };

    if start_height == 0 {
        for option in config.genesis.init_options() {
            if let Response::InitState(log) = consensus.handle(Request::InitState {
                key: option.key.clone(),
                value: option.value.clone(),
            }) {
                info!("InitState {} -> {}", option.key, log);
            }
        }
        consensus.handle(Request::InitChain {
            validators: Vec::new(),
        });
    }

    // Mempool connection: validates every transaction on its own task while
    // the consensus connection applies blocks.
    let (tx_sender, mut tx_receiver) = mpsc::channel::<Vec<u8>>(64);
    let mempool_task = {
        let mempool = mempool.clone();
        tokio::spawn(async move {
            let mut rejected = 0u64;
            while let Some(raw) = tx_receiver.recv().await {
                let mempool = mempool.clone();
                let response =
                    tokio::task::spawn_blocking(move || mempool.handle(Request::CheckTx(raw)))
                        .await;
                if let Ok(Response::CheckTx(result)) = response {
                    if !result.is_ok() {
                        rejected += 1;
                    }
                }
            }
            rejected
        })
    };

    let mut height = start_height;
    for txs in blocks {
        for raw in &txs {
            if tx_sender.send(raw.clone()).await.is_err() {
                warn!("Mempool connection closed");
            }
        }

        height += 1;
        let mut hasher = Sha256::new();
        for raw in &txs {
            hasher.update(raw);
        }
        let hash: [u8; 32] = hasher.finalize().into();
        let header = Header {
            chain_id: app.chain_id(),
            height,
            time: chrono::Utc::now().timestamp_millis(),
            num_txs: txs.len() as u64,
        };

        consensus.handle(Request::BeginBlock {
            hash: hash.to_vec(),
            header,
        });
        let mut failed = 0usize;
        for raw in txs {
            if let Response::DeliverTx(result) = consensus.handle(Request::DeliverTx(raw)) {
                if !result.is_ok() {
                    failed += 1;
                    warn!("DeliverTx rejected ({:?}): {}", result.code, result.log);
                }
            }
        }
        let diffs = match consensus.handle(Request::EndBlock { height }) {
            Response::EndBlock(end) => end.diffs,
            _ => Vec::new(),
        };
        let commit = consensus.commit();

        println!(
            "{} {} {} {}",
            "🧱 Block".bright_cyan().bold(),
            commit.height.to_string().bright_white().bold(),
            "app_hash".dimmed(),
            hex::encode(commit.app_hash).bright_white()
        );
        if failed > 0 {
            println!("   {} {} rejected tx(s)", "⚠️".yellow(), failed);
        }
        for diff in diffs {
            println!(
                "   {} {} → power {}",
                "🗳️".bright_magenta(),
                hex::encode(&diff.pub_key),
                diff.power.to_string().bright_green()
            );
        }
    }

    drop(tx_sender);
    let rejected = mempool_task.await?;
    println!(
        "{} chain_id = {:?}, mempool rejected {} tx(s)",
        "✅ Done:".bright_green().bold(),
        app.chain_id(),
        rejected
    );
    Ok(())
}
