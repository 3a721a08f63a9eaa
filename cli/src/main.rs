//! roundindex CLI: replay decoded round events and inspect identities.
//!
//! Usage:
//! ```bash
//! roundindex replay events.jsonl --config roundindex.json --db rounds.db
//! roundindex asset-id erc721 --token 0x1111111111111111111111111111111111111111 --identifier 42
//! roundindex strategy-id 0xabc 1 2
//! roundindex info
//! ```

mod config;
mod logging;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, Stream};
use tokio::io::{AsyncBufReadExt, BufReader};

use roundindex_core::entity::AssetType;
use roundindex_core::handlers::round::CLAIM_PERIOD_DURATION_SECS;
use roundindex_core::{
    ids, CheckpointStore, EntityKind, EntityStore, EntityStoreExt, Indexer, IndexerConfig,
    IndexerError, LogEvent, MemoryCheckpointStore, MemoryEntityStore,
};
use roundindex_storage::SqliteStorage;

use config::RunConfig;

#[derive(Parser)]
#[command(
    name = "roundindex",
    about = "Derives Prop House houses, rounds, awards and balances from decoded logs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply JSON-lines events in order and print entity counts
    Replay {
        /// File with one decoded log event per line
        events: PathBuf,
        /// JSON run configuration (indexer, log, database)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// SQLite database path; overrides `database` from the config
        #[arg(long)]
        db: Option<String>,
    },

    /// Compute an asset id and the round receipt token id
    #[command(name = "asset-id")]
    AssetId {
        /// NATIVE, ERC20, ERC721 or ERC1155
        asset_type: String,
        /// Token contract (zero for native)
        #[arg(long)]
        token: Option<String>,
        /// Token id for ERC721/ERC1155
        #[arg(long)]
        identifier: Option<String>,
    },

    /// Compute a governance-power strategy id
    #[command(name = "strategy-id")]
    StrategyId {
        /// Strategy contract address as a uint256 word
        address: String,
        /// Strategy parameters
        params: Vec<String>,
    },

    /// Show defaults and supported events
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { events, config, db } => {
            cmd_replay(&events, config.as_deref(), db).await
        }

        Commands::AssetId { asset_type, token, identifier } => {
            cmd_asset_id(&asset_type, token.as_deref(), identifier.as_deref())
        }

        Commands::StrategyId { address, params } => cmd_strategy_id(&address, &params),

        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

fn cmd_info() {
    let defaults = IndexerConfig::default();
    println!("RoundIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default indexer id: {}", defaults.id);
    println!("  Default chain: {}", defaults.chain);
    println!(
        "  Default checkpoint interval: every {} logs",
        defaults.checkpoint_interval
    );
    println!("  Claim period after finalization: {CLAIM_PERIOD_DURATION_SECS}s");
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
    println!("  PropHouse events: HouseCreated, RoundCreated, DepositToRound, BatchDepositToRound");
    println!("  CreatorPass events: TransferSingle, TransferBatch");
    println!(
        "  Round events: RoundRegistered, RoundCancelled, RoundFinalized, AwardClaimed, \
         AssetRescued, TransferSingle, TransferBatch"
    );
}

// ─── Identity helpers ─────────────────────────────────────────────────────────

fn parse_word(raw: &str) -> Result<U256> {
    U256::from_str(raw).with_context(|| format!("invalid uint256 '{raw}'"))
}

fn cmd_asset_id(asset_type: &str, token: Option<&str>, identifier: Option<&str>) -> Result<()> {
    let asset_type = AssetType::from_str(asset_type).map_err(anyhow::Error::msg)?;
    let token = match token {
        Some(raw) => Address::from_str(raw).with_context(|| format!("invalid address '{raw}'"))?,
        None => Address::ZERO,
    };
    let identifier = match identifier {
        Some(raw) => parse_word(raw)?,
        None => U256::ZERO,
    };

    let id = ids::asset_id(asset_type, &token, &identifier);
    println!("asset id:         {}", ids::hex_key(id.as_slice()));
    println!("receipt token id: {}", U256::from_be_bytes(id.0));
    Ok(())
}

fn cmd_strategy_id(address: &str, params: &[String]) -> Result<()> {
    let address = parse_word(address)?;
    let params = params
        .iter()
        .map(|p| parse_word(p))
        .collect::<Result<Vec<_>>>()?;
    println!("{}", ids::strategy_id(&address, &params));
    Ok(())
}

// ─── Replay ───────────────────────────────────────────────────────────────────

/// One event per non-empty line; a bad line ends the stream with an error.
async fn read_events(path: &Path) -> Result<impl Stream<Item = Result<LogEvent, IndexerError>>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    let lines = BufReader::new(file).lines();

    Ok(stream::unfold((lines, 0usize), |(mut lines, mut line_no)| async move {
        loop {
            line_no += 1;
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    let event = serde_json::from_str::<LogEvent>(&line)
                        .map_err(|e| IndexerError::Other(format!("line {line_no}: {e}")));
                    return Some((event, (lines, line_no)));
                }
                Ok(None) => return None,
                Err(e) => {
                    let err = IndexerError::Other(format!("line {line_no}: {e}"));
                    return Some((Err(err), (lines, line_no)));
                }
            }
        }
    }))
}

async fn cmd_replay(events: &Path, config: Option<&Path>, db: Option<String>) -> Result<()> {
    let mut run = match config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if db.is_some() {
        run.database = db;
    }
    logging::init_tracing(&run.log);

    let store: Arc<dyn EntityStore>;
    let checkpoints: Box<dyn CheckpointStore>;
    match &run.database {
        Some(path) => {
            let sqlite = Arc::new(SqliteStorage::open(path).await?);
            tracing::info!(database = %path, "using sqlite storage");
            store = sqlite.clone();
            checkpoints = Box::new(sqlite);
        }
        None => {
            store = Arc::new(MemoryEntityStore::new());
            checkpoints = Box::new(MemoryCheckpointStore::new());
        }
    }

    let mut indexer = Indexer::new(store, checkpoints, run.indexer.clone());
    indexer.resume().await?;
    let stats = indexer.run(read_events(events).await?).await?;

    println!(
        "applied {}  skipped {}  already indexed {}",
        stats.applied, stats.skipped, stats.replayed
    );
    let store = indexer.router().store();
    for kind in EntityKind::ALL {
        let count = store.count(kind).await?;
        if count > 0 {
            println!("  {:<24}{count}", kind.as_str());
        }
    }
    Ok(())
}
