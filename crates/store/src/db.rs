//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations, run when a store is created.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Scan workers only ever run one point lookup at a time each.
const MAX_READ_CONNECTIONS: u32 = 16;

/// Which set of PRAGMAs a connection gets.
#[derive(Clone, Copy, Debug)]
enum Profile {
    /// One writer, no readers, throwaway on failure: durability is worthless.
    BulkLoad,
    /// Many readers, no writers.
    ReadOnly,
}

/// Database connection pool for a digest store.
///
/// This is the main entry point for interacting with the store file. It
/// manages the SQLite connection pool; wrap it in a
/// [`HashStore`](crate::HashStore) to actually query it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: u32, profile: Profile) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Apply the query-based PRAGMAs to EVERY connection instead of
            // only the first connection returned by the pool.
            .after_connect(move |conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta, profile).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Self { pool })
    }

    /// Create a brand new store at `path` for bulk loading.
    ///
    /// The file must not already exist (the builder deletes stale staging
    /// files first). The pool has exactly one connection: SQLite only allows
    /// one writer anyway, and the builder funnels every insert through it.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            // The store is written once, then renamed into place. If the
            // process dies half-way the staging file is garbage regardless,
            // so skip the journal and fsyncs entirely.
            .journal_mode(SqliteJournalMode::Off)
            .synchronous(SqliteSynchronous::Off)
            .locking_mode(SqliteLockingMode::Exclusive);
        let db = Self::new(options, 1, Profile::BulkLoad).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Open an existing store for scanning.
    ///
    /// Never creates a file: a missing store is [`ErrorKind::NotFound`].
    pub async fn open_read_only(path: impl AsRef<Path>, max_connections: usize) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let max = u32::try_from(max_connections).unwrap_or(u32::MAX).clamp(1, MAX_READ_CONNECTIONS);
        let options = SqliteConnectOptions::new().filename(path).read_only(true).create_if_missing(false);
        Self::new(options, max, Profile::ReadOnly).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        // In-memory database must be limited to one connection. Otherwise
        // parallel connections will see different databases.
        let db = Self::new(options, 1, Profile::BulkLoad).await?;
        db.migrate().await?;
        Ok(db)
    }

    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata, profile: Profile) -> sqlx::Result<()> {
        let pragmas = match profile {
            // ~1GiB of page cache: the digest index is the hot spot while
            // loading tens of millions of rows.
            Profile::BulkLoad => {
                r#"
                    PRAGMA cache_size = -1000000;
                    PRAGMA temp_store = MEMORY;
                "#
            },
            Profile::ReadOnly => {
                r#"
                    PRAGMA cache_size = -65536;
                    PRAGMA temp_store = MEMORY;
                    PRAGMA mmap_size = 268435456;
                "#
            },
        };
        sqlx::query(pragmas).execute(conn).await?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument("performing database migrations")]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// This waits for all connections to be returned to the pool and then
    /// closes them. After calling this, the Database instance (and every
    /// [`HashStore`](crate::HashStore) made from it) should not be used.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
