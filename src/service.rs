//! Quote acquisition pipeline
//!
//! `QuoteService` decides, per request, whether to answer from the cache or
//! go upstream:
//!
//! 1. compute the bucket key for the current time
//! 2. look the bucket up in the cache (a failed lookup counts as a miss)
//! 3. on a miss, fetch upstream under a sub-deadline of the request deadline
//! 4. on success, write the quote through the cache under its own deadline;
//!    a failed write is logged and never reaches the caller
//!
//! Cache read always precedes the fetch, which always precedes the write.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::QuoteCache;
use crate::config::Config;
use crate::deadline::Deadline;
use crate::quote::{BucketGranularity, Quote, ServedQuote};
use crate::upstream::{FetchError, QuoteSource};

/// Budgets and policy for the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub granularity: BucketGranularity,
    /// Budget for one upstream fetch, clamped by the request deadline
    pub request_timeout: Duration,
    /// Budget for one cache lookup, clamped by the request deadline
    pub lookup_timeout: Duration,
    /// Budget for one cache write, independent of the request deadline
    pub persist_timeout: Duration,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            granularity: config.cache.bucket,
            request_timeout: config.upstream.request_timeout(),
            lookup_timeout: config.cache.lookup_timeout(),
            persist_timeout: config.cache.persist_timeout(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Serves quotes from the cache or the upstream source
#[derive(Clone)]
pub struct QuoteService {
    source: Arc<dyn QuoteSource>,
    cache: Arc<dyn QuoteCache>,
    settings: ServiceSettings,
}

impl QuoteService {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        cache: Arc<dyn QuoteCache>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            source,
            cache,
            settings,
        }
    }

    /// Handles one quote request bounded by `deadline`
    pub async fn handle(&self, deadline: Deadline) -> Result<ServedQuote, FetchError> {
        self.handle_at(Utc::now(), deadline).await
    }

    /// Handles one quote request as if the wall clock read `now`
    ///
    /// # Returns
    /// * `Ok(ServedQuote)` - From the cache (four decimals) or upstream (verbatim)
    /// * `Err(FetchError)` - The upstream fetch timed out, failed, or was malformed
    pub async fn handle_at(
        &self,
        now: DateTime<Utc>,
        deadline: Deadline,
    ) -> Result<ServedQuote, FetchError> {
        let bucket_key = self.settings.granularity.bucket_key(now);

        let lookup_deadline = deadline.child(self.settings.lookup_timeout);
        match self.cache.get(&bucket_key, lookup_deadline).await {
            Ok(Some(record)) => {
                debug!(bucket = %bucket_key, id = record.id, "cache hit");
                return Ok(ServedQuote::from_cache(record.value));
            }
            Ok(None) => debug!(bucket = %bucket_key, "cache miss"),
            Err(e) => warn!(bucket = %bucket_key, error = %e, "cache lookup failed, fetching upstream"),
        }

        let fetch_deadline = deadline.child(self.settings.request_timeout);
        let bid = match self.source.fetch(fetch_deadline).await {
            Ok(bid) => bid,
            Err(e) => {
                warn!(bucket = %bucket_key, error = %e, timeout = e.is_timeout(), "upstream fetch failed");
                return Err(e);
            }
        };

        let quote = Quote { bucket_key, bid };
        info!(bucket = %quote.bucket_key, bid = quote.bid.raw_text(), "fetched upstream quote");

        let persist_deadline = Deadline::after(self.settings.persist_timeout);
        if let Err(e) = self
            .cache
            .put(&quote.bucket_key, quote.bid.value(), persist_deadline)
            .await
        {
            warn!(bucket = %quote.bucket_key, error = %e, "failed to persist quote");
        }

        Ok(ServedQuote::from_upstream(&quote))
    }
}
