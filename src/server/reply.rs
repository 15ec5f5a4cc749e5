//! Wire replies for `GET /quote`

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::quote::ServedQuote;
use crate::upstream::FetchError;

/// A rendered HTTP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireReply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

/// Renders the outcome of a quote request
///
/// Success is `200` with `{"bidPrice": "<price>"}`. Every failure kind is a
/// `500` with the cause as plain text; only the message tells a timeout apart
/// from malformed data.
pub fn format(outcome: &Result<ServedQuote, FetchError>) -> WireReply {
    match outcome {
        Ok(quote) => WireReply {
            status: StatusCode::OK,
            content_type: "application/json",
            // The price text came out of a successful f64 parse, so it needs no escaping
            body: format!(r#"{{"bidPrice": "{}"}}"#, quote.bid_price),
        },
        Err(e) => WireReply {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            content_type: "text/plain; charset=utf-8",
            body: e.to_string(),
        },
    }
}

impl IntoResponse for WireReply {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}
