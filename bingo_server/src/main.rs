//! Multi-tier bingo server using the async actor model.
//!
//! Each stake runs in its own TierActor managed by TierManager, with either a
//! PostgreSQL or an in-memory wallet ledger.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Error};
use bingo_engine::{
    db::Database,
    game::{CardTable, InMemoryCardTable},
    tier::TierManager,
    wallet::{InMemoryLedger, WalletLedger},
};
use bingo_server::{api, config::ServerConfig, logging, metrics};
use log::{info, warn};
use pico_args::Arguments;
use tokio::sync::broadcast;

const HELP: &str = "\
Run a multi-tier bingo server

USAGE:
  bingo_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Ledger database connection string  [default: env DATABASE_URL, in-memory ledger if unset]
  --cards      PATH        Card table JSON file  [default: env CARD_TABLE_PATH or data/cards.json]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  BET_TIERS                Comma-separated stakes, e.g. 10,20,50
  COUNTDOWN_SECS           Countdown before a round starts
  CALL_INTERVAL_MILLIS     Pause between called numbers
  GRACE_PERIOD_SECS        Window for further winners
  METRICS_BIND             Prometheus listener address
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let cards: Option<PathBuf> = pargs.opt_value_from_str("--cards")?;

    logging::init();

    let config = ServerConfig::from_env(bind, database_url, cards)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Metrics exported on http://{}/metrics", addr);
    }

    let cards: Arc<dyn CardTable> = Arc::new(
        InMemoryCardTable::from_file(&config.card_table_path)
            .with_context(|| format!("Failed to load card table {}", config.card_table_path.display()))?,
    );
    info!("Loaded {} cards from {}", cards.card_count(), config.card_table_path.display());

    let (ledger, database): (Arc<dyn WalletLedger>, Option<Arc<Database>>) = match &config.database {
        Some(db_config) => {
            info!("Connecting to ledger database");
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to apply migrations")?;
            info!("Database connected successfully");
            let ledger: Arc<dyn WalletLedger> = Arc::new(db.wallet_ledger());
            (ledger, Some(Arc::new(db)))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory ledger; balances are lost on restart");
            let ledger: Arc<dyn WalletLedger> = Arc::new(InMemoryLedger::new(config.default_wallet_balance));
            (ledger, None)
        }
    };

    let tiers = Arc::new(
        TierManager::new(config.tier.clone(), ledger, cards).with_allowed_bets(config.bet_tiers.iter().copied()),
    );
    let spawned = tiers.spawn_allowed().await?;
    info!("Server ready with {} tier(s): {:?}", spawned, config.bet_tiers);

    // Round logs and metrics follow the shared event feed
    let mut feed = tiers.subscribe_feed();
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => {
                    logging::log_round_event(&event);
                    metrics::record_event(&event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event log skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let app = api::create_router(api::AppState::new(tiers.clone(), database));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!("Server is running at http://{}. Press Ctrl+C to stop.", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    tiers.shutdown().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
