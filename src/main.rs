//! riskproof CLI
//!
//! Usage:
//!   riskproof --ledger ./ledger.db record --snapshot quote.json
//!   riskproof --ledger ./ledger.db size --request request.json --pool pool.json --proof
//!   riskproof --ledger ./ledger.db verify --promise promise.json --fill fill.json
//!   riskproof --ledger ./ledger.db summarize --window 24h
//!   riskproof classify --headline "Acme beats estimates" --source reuters --tickers ACME
//!   riskproof rebuild-stats --corpus corpus.json --lookback-days 365 --min-samples 30

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use riskproof::audit::{SystemTimeSource, TimeSource};
use riskproof::ledger::{MemoryLedger, SnapshotLedger, SqliteLedger};
use riskproof::models::{FillReport, MarketSnapshot, PoolStatus, PositionRequest, PreTradePromise};
use riskproof::risk::TrailingWindow;
use riskproof::signals::JsonCorpus;
use riskproof::{ProofEngine, SafetyConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pre/post-trade risk proofs over an append-only snapshot ledger
#[derive(Parser, Debug)]
#[command(name = "riskproof")]
#[command(about = "Machine-checked risk proofs for sizing, fills and trailing windows")]
struct Cli {
    /// SQLite ledger path (in-memory when omitted)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// TOML config path (environment defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Size a position request and prove it
    Size {
        /// Request JSON (file path or inline object)
        #[arg(long)]
        request: String,

        /// Pool status JSON (file path or inline object)
        #[arg(long)]
        pool: Option<String>,

        /// Run all nine proofs instead of the fast gate
        #[arg(long)]
        proof: bool,
    },

    /// Verify a fill against its pre-trade promise
    Verify {
        #[arg(long)]
        promise: String,

        #[arg(long)]
        fill: String,
    },

    /// Summarize a trailing or explicit window
    Summarize {
        /// 1h, 24h or 7d
        #[arg(long, conflicts_with_all = ["start", "end"])]
        window: Option<String>,

        #[arg(long, requires = "end")]
        start: Option<i64>,

        #[arg(long, requires = "start")]
        end: Option<i64>,
    },

    /// Classify a headline into event signals
    Classify {
        #[arg(long)]
        headline: String,

        #[arg(long)]
        source: String,

        /// Comma-separated tickers
        #[arg(long, value_delimiter = ',')]
        tickers: Vec<String>,
    },

    /// Rebuild validated reaction statistics from a historical corpus
    RebuildStats {
        #[arg(long)]
        corpus: PathBuf,

        #[arg(long, default_value = "365")]
        lookback_days: i64,

        #[arg(long, default_value = "30")]
        min_samples: usize,
    },

    /// Stamp and append a market snapshot
    Record {
        #[arg(long)]
        snapshot: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "riskproof=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Parse an argument that is either an inline JSON object or a path to one.
fn read_json<T: DeserializeOwned>(arg: &str) -> Result<T> {
    let trimmed = arg.trim_start();
    let text = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg).with_context(|| format!("Failed to read {}", arg))?
    };
    serde_json::from_str(&text).with_context(|| format!("Failed to parse JSON from {}", arg))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_ledger(path: Option<&PathBuf>) -> Result<Arc<dyn SnapshotLedger>> {
    let ledger: Arc<dyn SnapshotLedger> = match path {
        Some(p) => {
            let path = p.to_str().context("ledger path is not valid UTF-8")?;
            Arc::new(SqliteLedger::open(path)?)
        }
        None => Arc::new(MemoryLedger::new()),
    };
    Ok(ledger)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SafetyConfig::load(path)?,
        None => SafetyConfig::from_env(),
    };
    let ledger = open_ledger(cli.ledger.as_ref())?;
    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let engine = ProofEngine::new(config, ledger, time);

    info!(
        policy_hash = %engine.clock().policy_hash(),
        ledger = ?cli.ledger,
        "riskproof starting"
    );

    match cli.command {
        Commands::Size {
            request,
            pool,
            proof,
        } => {
            let request: PositionRequest = read_json(&request)?;
            if let Some(pool) = pool {
                let pool: PoolStatus = read_json(&pool)?;
                engine.update_pool_status(pool);
            }
            let result = engine.size_position(request, proof).await?;
            print_json(&result)?;
        }
        Commands::Verify { promise, fill } => {
            let promise: PreTradePromise = read_json(&promise)?;
            let fill: FillReport = read_json(&fill)?;
            let proof = engine.verify_fill(&promise, fill).await?;
            print_json(&proof)?;
        }
        Commands::Summarize { window, start, end } => {
            let summary = match (window, start, end) {
                (Some(w), _, _) => {
                    let window = TrailingWindow::parse(&w)
                        .with_context(|| format!("unknown window '{}', expected 1h, 24h or 7d", w))?;
                    engine.summarize_trailing(window).await?
                }
                (None, Some(start), Some(end)) => {
                    if end < start {
                        bail!("window end {} precedes start {}", end, start);
                    }
                    engine.summarize_window(start, end).await?
                }
                _ => engine.summarize_trailing(TrailingWindow::OneDay).await?,
            };
            print_json(&summary)?;
        }
        Commands::Classify {
            headline,
            source,
            tickers,
        } => {
            let signals = engine.classify(&headline, &source, &tickers);
            print_json(&signals)?;
        }
        Commands::RebuildStats {
            corpus,
            lookback_days,
            min_samples,
        } => {
            let corpus = JsonCorpus::load(&corpus)?;
            let table = engine
                .rebuild_reaction_stats(&corpus, lookback_days, min_samples)
                .await?;
            print_json(table.as_ref())?;
        }
        Commands::Record { snapshot } => {
            let snapshot: MarketSnapshot = read_json(&snapshot)?;
            let seq = engine.record_snapshot(snapshot).await?;
            print_json(&serde_json::json!({ "seq": seq }))?;
        }
    }

    Ok(())
}
