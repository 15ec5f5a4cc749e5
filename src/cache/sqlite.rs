//! SQLite-backed quote cache
//!
//! Diesel queries are blocking, so each one runs on tokio's blocking pool and
//! the awaiting side is cut off when the operation deadline passes. A write
//! that has already reached SQLite may still commit after its caller gave up.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use directories::ProjectDirs;
use tracing::info;

use super::schema::{currency, CREATE_SCHEMA};
use super::{CacheError, CacheRecord, QuoteCache};
use crate::deadline::Deadline;

/// Connection pool type
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const MAX_CONNECTIONS: u32 = 8;

/// How long to wait for a pooled connection before giving up
const POOL_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite waits this long on a locked database before returning SQLITE_BUSY
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Returns the default database location
///
/// Uses `~/.local/share/fxquote/quotes.db` on Linux, or the equivalent XDG
/// data path on other platforms. Falls back to `./app.db` when no home
/// directory can be determined.
pub fn default_database_path() -> PathBuf {
    ProjectDirs::from("", "", "fxquote")
        .map(|dirs| dirs.data_dir().join("quotes.db"))
        .unwrap_or_else(|| PathBuf::from("app.db"))
}

/// Applies per-connection pragmas
#[derive(Debug)]
struct ConnectionPragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionPragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {};",
            BUSY_TIMEOUT.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = currency)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct CurrencyRow {
    id: i32,
    quote_date: String,
    value: f64,
}

impl CurrencyRow {
    fn into_record(self) -> CacheRecord {
        CacheRecord {
            id: self.id,
            bucket_key: self.quote_date,
            value: self.value,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = currency)]
struct NewCurrencyRow<'a> {
    quote_date: &'a str,
    value: f64,
}

/// Quote cache stored in a SQLite `currency` table
#[derive(Clone)]
pub struct SqliteQuoteStore {
    pool: DbPool,
}

impl SqliteQuoteStore {
    /// Opens the database at `path` and creates the schema if needed
    ///
    /// Safe to call on every start: schema creation is idempotent.
    ///
    /// # Returns
    /// * `Ok(SqliteQuoteStore)` on success
    /// * `Err(CacheError)` if the directory, pool or schema cannot be set up
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "opening quote database");
        let manager = ConnectionManager::<SqliteConnection>::new(path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(MAX_CONNECTIONS)
            .connection_timeout(POOL_CHECKOUT_TIMEOUT)
            .connection_customizer(Box::new(ConnectionPragmas))
            .build(manager)
            .map_err(|e| CacheError::Pool(e.to_string()))?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), CacheError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| CacheError::Pool(e.to_string()))?;
        conn.batch_execute(CREATE_SCHEMA)?;
        Ok(())
    }

    /// Lists every record stored for `bucket_key`, oldest first
    pub async fn records(&self, bucket_key: &str) -> Result<Vec<CacheRecord>, CacheError> {
        let pool = self.pool.clone();
        let key = bucket_key.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<CacheRecord>, CacheError> {
            let mut conn = pool.get().map_err(|e| CacheError::Pool(e.to_string()))?;
            let rows = currency::table
                .filter(currency::quote_date.eq(&key))
                .order(currency::id.asc())
                .select(CurrencyRow::as_select())
                .load(&mut conn)?;
            Ok(rows.into_iter().map(CurrencyRow::into_record).collect())
        })
        .await?
    }
}

#[async_trait]
impl QuoteCache for SqliteQuoteStore {
    async fn get(&self, bucket_key: &str, deadline: Deadline) -> Result<Option<CacheRecord>, CacheError> {
        let pool = self.pool.clone();
        let key = bucket_key.to_string();

        let task = tokio::task::spawn_blocking(move || -> Result<Option<CacheRecord>, CacheError> {
            let mut conn = pool.get().map_err(|e| CacheError::Pool(e.to_string()))?;
            // Duplicate rows can exist after racing writers; the oldest wins
            let row = currency::table
                .filter(currency::quote_date.eq(&key))
                .order(currency::id.asc())
                .select(CurrencyRow::as_select())
                .first(&mut conn)
                .optional()?;
            Ok(row.map(CurrencyRow::into_record))
        });

        deadline.run(task).await.map_err(|_| CacheError::Timeout)??
    }

    async fn put(&self, bucket_key: &str, value: f64, deadline: Deadline) -> Result<(), CacheError> {
        let pool = self.pool.clone();
        let key = bucket_key.to_string();

        let task = tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let mut conn = pool.get().map_err(|e| CacheError::Pool(e.to_string()))?;
            diesel::insert_into(currency::table)
                .values(&NewCurrencyRow {
                    quote_date: &key,
                    value,
                })
                .execute(&mut conn)?;
            Ok(())
        });

        deadline.run(task).await.map_err(|_| CacheError::Timeout)??
    }
}
