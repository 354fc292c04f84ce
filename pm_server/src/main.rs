//! Tournament settlement server.
//!
//! Serves the operator settlement API over a Postgres-backed settlement store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use log::info;
use pico_args::Arguments;
use pm_server::{api, config::ServerConfig, logging, metrics};
use prediction_market::{
    db::Database,
    settlement::{PgSettlementStore, SettlementCoordinator},
};

const HELP: &str = "\
Run the tournament settlement server

USAGE:
  pm_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --migrate                Apply database migrations before serving
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND                     Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND                    Prometheus exporter address (e.g., 0.0.0.0:9090)
  DATABASE_URL                    PostgreSQL connection string
  SETTLEMENT_LOCK_TIMEOUT_MS      Wait for a busy tournament's lock (default: 5000)
  SETTLEMENT_COMMIT_TIMEOUT_SECS  Upper bound on the settlement commit (default: 10)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        migrate: pargs.contains("--migrate"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics at http://{}/metrics", metrics_bind);
    }

    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected successfully");

    if args.migrate {
        db.run_migrations()
            .await
            .context("Failed to apply migrations")?;
        info!("Migrations applied");
    }

    let store = PgSettlementStore::new(Arc::new(db.pool().clone()));
    let coordinator = SettlementCoordinator::new(Arc::new(store), config.settlement.clone());
    info!(
        "Settlement lock timeout {:?}, commit timeout {:?}",
        config.settlement.lock_timeout, config.settlement.commit_timeout
    );

    let app = api::create_router(api::AppState {
        coordinator: Arc::new(coordinator),
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
