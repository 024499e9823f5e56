//! Susu API Server
//!
//! Main entry point for the savings-circle ledger service.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use susu_api::{AppState, create_router};
use susu_core::LedgerFacade;
use susu_core::ports::{Ports, SystemClock};
use susu_db::{connect_with, postgres_ports};
use susu_shared::{AppConfig, LedgerBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "susu=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Select the ledger backend
    let ports = match config.ledger.backend {
        LedgerBackend::Postgres => {
            let db = connect_with(&config.database).await?;
            info!("Connected to database");
            postgres_ports(&db, Arc::new(SystemClock))
        }
        LedgerBackend::Memory => {
            warn!("Using in-memory ledgers; all state is lost on shutdown");
            Ports::process_local(Arc::new(SystemClock)).0
        }
    };

    let sweep_every = Duration::from_secs(config.ledger.sweep_interval_secs.max(1));
    let facade = Arc::new(LedgerFacade::new(ports, config.ledger));

    // Warm the projection so the first request does not fold the whole log
    let sequence = facade.rebuild_projection().await?;
    info!(sequence = %sequence, "Projection loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(run_sweeper(facade.clone(), sweep_every, shutdown_rx));

    // Create router
    let app = create_router(AppState { facade });

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    sweeper.await?;
    info!("Server stopped");

    Ok(())
}

/// Closes expired votes and flags overdue loans until shutdown.
async fn run_sweeper(
    facade: Arc<LedgerFacade>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => match facade.sweep().await {
                Ok(report) if !report.rejected.is_empty() || !report.overdue.is_empty() => {
                    info!(
                        rejected = report.rejected.len(),
                        overdue = report.overdue.len(),
                        skipped = report.skipped.len(),
                        "Loan sweep closed loans"
                    );
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "Loan sweep failed"),
            },
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
