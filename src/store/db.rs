//! SQLite connection pool and schema management

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use super::StoreError;

/// Tables the application needs before it can serve requests
pub const REQUIRED_TABLES: [&str; 5] = ["settings", "orders", "clubs", "somm_scores", "ref_table"];

/// Database handle shared by all stores
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the database at `db_path` and apply the schema.
    ///
    /// `:memory:` opens a private in-memory database held by a single connection.
    pub async fn connect(db_path: &str) -> Result<Self, StoreError> {
        let pool = if db_path == ":memory:" {
            let options = SqliteConnectOptions::from_str(":memory:")?;
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    debug!(dir = %parent.display(), "Ensuring data directory exists");
                    tokio::fs::create_dir_all(parent).await?;
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(db_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

            SqlitePoolOptions::new()
                .max_connections(10)
                .connect_with(options)
                .await?
        };

        info!("Connected to database at {}", db_path);

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables, indexes and default settings.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        debug!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations completed");
        Ok(())
    }

    /// Required tables that do not exist yet
    pub async fn missing_tables(&self) -> Result<Vec<&'static str>, StoreError> {
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(&self.pool)
            .await?;
        let present: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()?;

        Ok(REQUIRED_TABLES
            .iter()
            .copied()
            .filter(|t| !present.iter().any(|p| p == t))
            .collect())
    }

    /// Remove all ingested and derived data; settings are kept
    pub async fn clear_data(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for table in ["orders", "clubs", "somm_scores", "ref_table"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Cleared orders, clubs, scores and reference data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_database_has_schema() {
        let db = Db::connect(":memory:").await.unwrap();
        assert!(db.missing_tables().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_database_creates_parent_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("commerce7.db");
        let path = path.to_str().unwrap().to_string();

        let db = Db::connect(&path).await.unwrap();
        sqlx::query("INSERT INTO settings (key, value) VALUES ('marker', 'x')")
            .execute(db.pool())
            .await
            .unwrap();
        db.pool().close().await;

        // migrations are idempotent against an existing file
        let db = Db::connect(&path).await.unwrap();
        let value: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = 'marker'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(value, "x");
    }

    #[tokio::test]
    async fn clear_data_keeps_settings() {
        let db = Db::connect(":memory:").await.unwrap();
        sqlx::query(
            "INSERT INTO orders (order_number, order_paid_date, subtotal, tip_total)
             VALUES ('1', '2024-01-01', 10, 0)",
        )
            .execute(db.pool())
            .await
            .unwrap();
        db.clear_data().await.unwrap();

        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let settings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(orders, 0);
        assert_eq!(settings, 8);
    }
}
