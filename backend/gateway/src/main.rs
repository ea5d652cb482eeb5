//! txflow gateway — entry point.
//!
//! Sequences pre-signed marketplace transactions (approve, purchase, ...)
//! against an Ethereum JSON-RPC node, tracking every step until its receipt
//! is final, and serves contract lifecycle projections evaluated against the
//! chain clock. Everything is exposed over a small Axum REST API.

mod api;
mod clock;
mod config;
mod errors;
mod rpc;
mod runs;
mod steps;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clock::{ChainClock, Clock, SystemClock};
use config::{ClockSource, Config};
use rpc::{ReceiptPoller, RpcClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // HTTP client shared by the RPC client and post-confirmation hooks.
    let client = Client::builder().timeout(config.http_timeout).build()?;

    let rpc = Arc::new(RpcClient::new(client.clone(), config.rpc_url.clone()));
    let receipts = Arc::new(ReceiptPoller::new(
        rpc.clone(),
        config.receipt_poll_interval,
        config.receipt_timeout,
    ));
    let clock: Arc<dyn Clock> = match config.clock_source {
        ClockSource::Chain => Arc::new(ChainClock::new(rpc.clone())),
        ClockSource::System => Arc::new(SystemClock),
    };
    info!(
        "Using RPC {} with {:?} clock",
        config.rpc_url, config.clock_source
    );

    let state = Arc::new(api::ApiState {
        runs: runs::RunRegistry::default(),
        rpc,
        receipts,
        client,
        clock,
    });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/runs", post(api::create_run))
        .route("/runs/:id", get(api::get_run).delete(api::delete_run))
        .route("/runs/:id/execute", post(api::execute_run))
        .route("/runs/:id/steps/:index/execute", post(api::execute_step))
        .route("/lifecycle/progress", post(api::lifecycle_progress))
        .route("/lifecycle/status", post(api::lifecycle_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
