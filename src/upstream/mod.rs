//! Upstream quote source
//!
//! This module talks to the external currency-quote service. A fetch issues
//! exactly one GET bound to a caller-supplied [`Deadline`] and classifies the
//! outcome so the orchestrator can tell a timeout apart from a transport
//! failure or a malformed body.

mod client;
mod parse;

pub use client::UpstreamClient;
pub use parse::parse_bid;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::deadline::Deadline;
use crate::quote::Bid;

/// Errors that can occur when fetching a quote upstream
#[derive(Debug, Error)]
pub enum FetchError {
    /// The deadline elapsed before the response was fully read
    #[error("upstream request timed out: deadline exceeded")]
    DeadlineExceeded,

    /// Connection-level failure (refused, reset, DNS, ...)
    #[error("upstream request failed: {0}")]
    Transport(reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("upstream returned status {0}")]
    Status(StatusCode),

    /// The body did not carry a usable bid price
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::DeadlineExceeded)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::DeadlineExceeded
        } else if let Some(status) = err.status() {
            FetchError::Status(status)
        } else {
            FetchError::Transport(err)
        }
    }
}

/// Result of one fetch attempt
pub type FetchOutcome = Result<Bid, FetchError>;

/// Something that can produce a bid price before a deadline
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, deadline: Deadline) -> FetchOutcome;
}
