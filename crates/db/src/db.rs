//! Connection pool setup.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Pool size for file databases: analysis runs several packages at once,
/// and each of them reads and writes.
const POOL_SIZE: u32 = 5;
/// Writers queue up behind each other in WAL mode; version replacement is
/// the longest write and still well under this.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-connection settings `SqliteConnectOptions` has no setter for.
const CONNECTION_PRAGMAS: &str = r#"
    PRAGMA wal_autocheckpoint = 800;
    PRAGMA cache_size = -8192;
    PRAGMA temp_store = MEMORY;
"#;

/// A migrated SQLite database.
///
/// Cheap to clone. Queries go through a [`Repository`](crate::Repository)
/// built from it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path` and bring its
    /// schema up to date. The parent directory must exist.
    #[instrument(fields(path = %path.as_ref().display()), skip(path))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, POOL_SIZE).await
    }

    /// A private in-memory database, gone once the pool closes.
    ///
    /// Restricted to a single connection: every in-memory connection would
    /// otherwise get a database of its own. Available outside of tests so
    /// that dependent crates can use it in theirs.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, pool_size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .after_connect(|conn, meta| Box::pin(async move { configure(conn, meta).await }))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply pending migrations. Already applied ones are skipped.
    #[instrument(skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Refresh planner statistics and close every connection, once they've
    /// all been returned.
    pub async fn close(&self) {
        if let Err(err) = sqlx::query("PRAGMA optimize").execute(&self.pool).await {
            tracing::debug!(error = %err, "Skipped PRAGMA optimize");
        }
        self.pool.close().await;
    }
}

fn options() -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        // Deleting versions relies on ON DELETE CASCADE for their builds.
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
}

async fn configure(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
    sqlx::query(CONNECTION_PRAGMAS).execute(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pragma(db: &Database, name: &str) -> i64 {
        let (value,): (i64,) = sqlx::query_as(&format!("PRAGMA {name}")).fetch_one(db.pool()).await.unwrap();
        value
    }

    #[tokio::test]
    async fn test_in_memory_schema_is_ready() {
        let db = Database::connect_in_memory().await.unwrap();
        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('packages', 'versions', 'builds')",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 3);
        // Re-running finds nothing to do.
        db.migrate().await.unwrap();
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_connection_settings() {
        let db = Database::connect_in_memory().await.unwrap();
        assert_eq!(pragma(&db, "foreign_keys").await, 1);
        assert_eq!(pragma(&db, "wal_autocheckpoint").await, 800);
        assert_eq!(pragma(&db, "busy_timeout").await, 5000);
        db.close().await;
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildfleet.sqlite3");
        let db = Database::connect(&path).await.unwrap();
        sqlx::query("INSERT INTO packages (url, created_at, updated_at) VALUES ('https://example.com/pkg', 0, 0)")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let db = Database::connect(&path).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM packages").fetch_one(db.pool()).await.unwrap();
        assert_eq!(count, 1);
        db.close().await;
    }
}
