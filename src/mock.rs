//! Mock upstream quote service
//!
//! Serves a brapi-style currency payload on `GET /mock` after a configurable
//! delay, so the server's deadline handling can be exercised without a real
//! provider or its rate limits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::config::MockConfig;
use crate::error::Result;

#[derive(Debug, Clone)]
struct MockState {
    delay: Duration,
    bid_price: String,
}

/// Logs when a request is dropped before its reply was produced
struct CancelGuard {
    done: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if !self.done {
            info!("mock request cancelled by caller");
        }
    }
}

/// The canned upstream body carrying `bid_price`
pub fn payload(bid_price: &str) -> serde_json::Value {
    json!({
        "currency": [
            {
                "fromCurrency": "USD",
                "toCurrency": "BRL",
                "name": "Dólar Americano/Real Brasileiro",
                "high": "5.22",
                "low": "5.162",
                "bidVariation": "0.0454",
                "percentageChange": "0.88",
                "bidPrice": bid_price,
                "askPrice": "5.2127",
                "updatedAtTimestamp": "1696601423",
                "updatedAtDate": "2023-10-06 11:10:23"
            }
        ]
    })
}

/// Builds the router serving `GET /mock`
pub fn router(config: &MockConfig) -> Router {
    let state = MockState {
        delay: config.delay(),
        bid_price: config.bid_price.clone(),
    };

    Router::new()
        .route("/mock", get(mock_handler))
        .with_state(Arc::new(state))
}

async fn mock_handler(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    let mut guard = CancelGuard { done: false };
    tokio::time::sleep(state.delay).await;
    guard.done = true;

    debug!(bid = %state.bid_price, "mock reply");
    (
        [(header::CONTENT_TYPE, "application/json")],
        payload(&state.bid_price).to_string(),
    )
}

/// Runs the mock upstream until Ctrl-C
pub async fn serve(config: &MockConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, delay_ms = config.delay_ms, "mock upstream listening");

    axum::serve(listener, router(config))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::parse_bid;

    #[test]
    fn test_payload_parses_as_upstream_body() {
        let body = payload("5.2097").to_string();
        let bid = parse_bid(&body).unwrap();

        assert_eq!(bid.raw_text(), "5.2097");
    }

    #[test]
    fn test_payload_carries_configured_price() {
        let body = payload("4.9876");
        assert_eq!(body["currency"][0]["bidPrice"], "4.9876");
    }
}
