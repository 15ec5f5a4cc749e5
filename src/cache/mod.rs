//! Quote cache keyed by time bucket
//!
//! This module stores at most one quote per bucket (best effort) in a durable
//! key-value store. Every lookup and write is bound by its own short deadline.
//! A missing record is a normal outcome; store failures surface as
//! [`CacheError`] so the caller can decide to fail open.

mod schema;
mod sqlite;

pub use sqlite::{default_database_path, SqliteQuoteStore};

use async_trait::async_trait;
use thiserror::Error;

use crate::deadline::Deadline;

/// A persisted quote
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    /// Assigned by the store, increasing
    pub id: i32,
    pub bucket_key: String,
    pub value: f64,
}

/// Errors that can occur when reading or writing the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The operation did not finish before its deadline
    #[error("cache operation timed out")]
    Timeout,

    /// The database directory could not be created
    #[error("cache directory unavailable: {0}")]
    Io(#[from] std::io::Error),

    /// No connection could be taken from the pool
    #[error("cache connection unavailable: {0}")]
    Pool(String),

    /// The query itself failed
    #[error("cache query failed: {0}")]
    Database(#[from] diesel::result::Error),

    /// The blocking worker running the query panicked or was cancelled
    #[error("cache worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Storage for one quote per time bucket
#[async_trait]
pub trait QuoteCache: Send + Sync {
    /// Looks up the first record for `bucket_key`
    async fn get(&self, bucket_key: &str, deadline: Deadline) -> Result<Option<CacheRecord>, CacheError>;

    /// Inserts a new record; never updates an existing one
    async fn put(&self, bucket_key: &str, value: f64, deadline: Deadline) -> Result<(), CacheError>;
}
