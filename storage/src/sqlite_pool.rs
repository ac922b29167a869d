//! SQLite connection pool wrapper for the storage crate.

use log::info;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};

/// Manages a single SQLite pool; creates the DB file if missing.
#[derive(Clone)]
pub struct SqlitePoolManager {
    pool: SqlitePool,
}

impl SqlitePoolManager {
    /// Creates a pool for the given database URL (`sqlite::memory:` or a
    /// file path).
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        info!("Initializing SQLite pool: {}", database_url);

        let pool = if database_url == "sqlite::memory:" {
            // In-memory pools must keep at least one connection alive or the
            // database vanishes between queries.
            let options: SqliteConnectOptions = database_url.parse()?;
            sqlx::pool::PoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .connect_with(options)
                .await?
        } else {
            let options = SqliteConnectOptions::new()
                .create_if_missing(true)
                .filename(database_url);
            SqlitePool::connect_with(options).await?
        };

        Ok(Self { pool })
    }

    /// Returns the underlying pool for running queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
