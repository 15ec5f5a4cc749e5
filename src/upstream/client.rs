//! HTTP client for the upstream quote service

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use tracing::debug;

use super::{parse_bid, FetchError, FetchOutcome, QuoteSource};
use crate::deadline::Deadline;

/// Largest upstream body accepted; a quote reply is a few hundred bytes
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Client for fetching the current bid from the upstream service
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http_client: Client,
    url: String,
    token: String,
}

impl UpstreamClient {
    /// Creates a new UpstreamClient with a default HTTP client
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .user_agent(concat!("fxquote/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http_client, url, token))
    }

    /// Creates a new UpstreamClient with a custom HTTP client
    pub fn with_client(http_client: Client, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
            token: token.into(),
        }
    }

    /// Fetches the bid from `url` with one GET bound to `deadline`
    ///
    /// The bearer header is always sent, even for an empty token. No retries
    /// are attempted.
    ///
    /// # Returns
    /// * `Ok(Bid)` - The bid price parsed from the response body
    /// * `Err(FetchError::DeadlineExceeded)` - Headers or body were not read in time
    /// * `Err(FetchError::Transport | FetchError::Status)` - Connection failure or non-2xx reply
    /// * `Err(FetchError::Malformed)` - The body is oversized or lacks a usable bid price
    pub async fn fetch_from(&self, url: &str, token: &str, deadline: Deadline) -> FetchOutcome {
        let request = self
            .http_client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", token));

        let body = deadline
            .run(async {
                let mut response = request.send().await?.error_for_status()?;
                if response
                    .content_length()
                    .is_some_and(|len| len > MAX_BODY_BYTES as u64)
                {
                    return Err(too_large());
                }

                let mut body = Vec::new();
                while let Some(chunk) = response.chunk().await? {
                    if body.len() + chunk.len() > MAX_BODY_BYTES {
                        return Err(too_large());
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok::<_, FetchError>(body)
            })
            .await
            .map_err(|_| FetchError::DeadlineExceeded)??;

        debug!(bytes = body.len(), "upstream body received");
        let body = String::from_utf8(body)
            .map_err(|_| FetchError::Malformed("body is not valid UTF-8".to_string()))?;
        parse_bid(&body)
    }
}

fn too_large() -> FetchError {
    FetchError::Malformed(format!("body exceeds {} bytes", MAX_BODY_BYTES))
}

#[async_trait]
impl QuoteSource for UpstreamClient {
    async fn fetch(&self, deadline: Deadline) -> FetchOutcome {
        self.fetch_from(&self.url, &self.token, deadline).await
    }
}
