//! HTTP front end
//!
//! Exposes `GET /quote`. Each request gets its own [`Deadline`] that bounds
//! every cache and upstream call made on its behalf. When a caller hangs up,
//! axum drops the handler future and whatever it had in flight with it.

pub mod reply;

pub use reply::{format, WireReply};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::cache::SqliteQuoteStore;
use crate::config::Config;
use crate::deadline::Deadline;
use crate::error::Result;
use crate::service::{QuoteService, ServiceSettings};
use crate::upstream::UpstreamClient;

/// Shared per-process state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub service: QuoteService,
    /// End-to-end bound for one inbound request
    pub request_deadline: Duration,
}

/// Builds the router serving `GET /quote`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/quote", get(quote_handler))
        .with_state(Arc::new(state))
}

async fn quote_handler(State(state): State<Arc<AppState>>) -> WireReply {
    let started = Instant::now();
    let deadline = Deadline::after(state.request_deadline);

    let outcome = state.service.handle(deadline).await;
    let reply = format(&outcome);

    info!(
        status = reply.status.as_u16(),
        origin = outcome.as_ref().map(|q| q.origin.as_str()).unwrap_or("none"),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "GET /quote"
    );
    reply
}

/// Wires the store, upstream client and quote service from configuration
///
/// Any failure here is fatal: the server must not start without its store.
pub fn build_state(config: &Config) -> Result<AppState> {
    let store = SqliteQuoteStore::open(&config.cache.database_path())?;
    let upstream = UpstreamClient::new(config.upstream.url.clone(), config.upstream.token.clone())?;
    let service = QuoteService::new(
        Arc::new(upstream),
        Arc::new(store),
        ServiceSettings::from_config(config),
    );

    Ok(AppState {
        service,
        request_deadline: config.server.deadline(),
    })
}

/// Runs the quote server until Ctrl-C
pub async fn serve(config: &Config) -> Result<()> {
    let state = build_state(config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        upstream = %config.upstream.url,
        bucket = ?config.cache.bucket,
        "listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
