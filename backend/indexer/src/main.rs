//! MaungBiz DAO dashboard service entry point.
//!
//! Starts a background indexer task that polls Soroban `getEvents` RPC for
//! DAO contract events, persists them to SQLite and keeps proposal snapshots
//! current. Simultaneously exposes an Axum REST API for the dashboard:
//! proposal, treasury and impact views, form validation, preflight checks
//! and a relay for wallet-signed transactions.

mod analytics;
mod api;
mod cache;
mod config;
mod db;
mod errors;
mod events;
mod indexer;
mod precheck;
mod projection;
mod proposal;
mod rpc;
mod subscription;
mod treasury;
mod tx;
mod validation;

use std::sync::Arc;

use reqwest::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use indexer::IndexerState;
use subscription::EventBus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // HTTP client shared between the indexer and the transaction relay.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    // Cancelled on Ctrl-C / SIGTERM; stops the indexer and every subscription.
    let shutdown = CancellationToken::new();
    let bus = EventBus::new(shutdown.clone());

    // ─── Background indexer ───────────────────────────────
    let indexer_state = Arc::new(IndexerState {
        pool: pool.clone(),
        config: config.clone(),
        client: client.clone(),
        bus: bus.clone(),
    });
    let indexer = tokio::spawn(indexer::run(indexer_state, shutdown.clone()));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState::new(pool.clone(), config.clone(), client, bus));

    let app = api::router(api_state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    api_state.close();
    if let Err(e) = indexer.await {
        warn!("indexer task ended abnormally: {e}");
    }
    pool.close().await;
    info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM, then cancels `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
        () = token.cancelled() => {},
    }

    info!("Signal received, starting graceful shutdown");
    token.cancel();
}
