//! Repository over the `digests` table.

use crate::error::{ErrorKind, Result};
use crate::{BLANK_DIGEST, Database};
use exn::ResultExt;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use tracing::instrument;

// One bound parameter per row; stays well below SQLite's variable limit.
const INSERT_CHUNK: usize = 4096;

/// Indexed set of known-malicious digests.
///
/// Cheap to clone (it's a pool handle), and every read method is safe to call
/// from any number of tasks at once. Nothing but [`insert_batch`] and
/// [`remove`] ever writes, and only the builder calls those.
///
/// [`insert_batch`]: Self::insert_batch
/// [`remove`]: Self::remove
#[derive(Debug, Clone)]
pub struct HashStore {
    pool: SqlitePool,
}
impl From<&Database> for HashStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl HashStore {
    /// Create a new store handle with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Write (builder only)
    // =========================================================================

    /// Insert digests as new rows, in a single transaction.
    ///
    /// Either every row makes it in or none do. Returns the number of rows
    /// inserted.
    #[instrument(skip_all, fields(digests = digests.len()))]
    pub async fn insert_batch(&self, digests: &[String]) -> Result<u64> {
        if digests.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut inserted = 0;
        for chunk in digests.chunks(INSERT_CHUNK) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("INSERT INTO digests (digest) ");
            query.push_values(chunk, |mut row, digest| {
                row.push_bind(digest.as_str());
            });
            let result = query.build().execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
            inserted += result.rows_affected();
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(inserted)
    }

    /// Delete every row holding `digest`. Returns the number of rows deleted.
    pub async fn remove(&self, digest: impl AsRef<str>) -> Result<u64> {
        let result = sqlx::query(include_str!("../queries/delete_digest.sql"))
            .bind(digest.as_ref())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    /// Delete the blank-content digest, see [`BLANK_DIGEST`].
    pub async fn remove_sentinel(&self) -> Result<u64> {
        self.remove(BLANK_DIGEST).await
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Is `digest` a known-malicious digest?
    pub async fn lookup(&self, digest: impl AsRef<str>) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(include_str!("../queries/lookup.sql"))
            .bind(digest.as_ref())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(found != 0)
    }

    /// Total number of rows, duplicates included.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check the store file at `path`: it must exist, open, and hold exactly
    /// `expected` rows.
    ///
    /// Never fails: anything that goes wrong along the way is logged and the
    /// store is simply not valid.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn validate(path: impl AsRef<Path>, expected: u64) -> bool {
        let db = match Database::open_read_only(path.as_ref(), 1).await {
            Ok(db) => db,
            Err(e) => {
                tracing::error!(error = ?e, "Store could not be opened");
                return false;
            },
        };
        let count = HashStore::from(&db).count().await;
        db.close().await;
        match count {
            Ok(count) if count == expected => true,
            Ok(count) => {
                tracing::error!(count, expected, "Store row count does not match the expected count");
                false
            },
            Err(e) => {
                tracing::error!(error = ?e, "Store is invalid");
                false
            },
        }
    }
}
