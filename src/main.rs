use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_core::adapters::PostgresTransactionStore;
use wallet_core::casino::CasinoClient;
use wallet_core::cli::{Cli, Commands, DbCommands, TxCommands};
use wallet_core::config::Config;
use wallet_core::services::{ReconciliationSweeper, SweeperConfig, WebhookService};
use wallet_core::use_cases::CreateDeposit;
use wallet_core::{cli, create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    match args.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Tx(TxCommands::ForceComplete { tx_id, note })) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_tx_force_complete(&pool, tx_id, &note).await
        }
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&config).await,
        Some(Commands::Config) => cli::handle_config_validate(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let casino = CasinoClient::new(
        config.casino_api_url.clone(),
        config.casino_api_key.clone(),
        config.transfer_timeout,
    );

    let report = startup::validate_environment(&config, &pool, &casino).await?;
    report.print();
    if !report.is_valid() {
        tracing::warn!("startup validation reported failures, continuing anyway");
    }

    let store: Arc<dyn wallet_core::ports::TransactionStore> =
        Arc::new(PostgresTransactionStore::new(pool.clone()));
    let ledger: Arc<dyn wallet_core::ports::LedgerTransfer> = Arc::new(casino.clone());

    let webhooks = Arc::new(WebhookService::new(store.clone(), ledger.clone()));
    let deposits = Arc::new(CreateDeposit::new(store.clone()));

    let sweeper = Arc::new(ReconciliationSweeper::new(
        store.clone(),
        ledger.clone(),
        SweeperConfig::from_config(&config),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    let state = AppState {
        db: pool,
        store,
        webhooks,
        deposits,
        casino,
        webhook_secret: config.webhook_secret.clone(),
        started_at: Instant::now(),
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the sweeper drain its current sweep before exiting.
    shutdown_tx.send(true).ok();
    sweeper_handle.await.ok();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
