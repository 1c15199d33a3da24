use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use super::types::StoreError;

/// Handle to the news store. Cloning shares the underlying pool; each
/// concurrent task leases its own pooled connection for a write, so
/// interleaved tasks never share a connection mid-statement.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if necessary) the database and runs idempotent
    /// schema creation.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub(super) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        // The UNIQUE pair backs the dedup key; a lost check-then-insert
        // race degrades to a conflict instead of a duplicate row.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                link TEXT NOT NULL,
                publish_date INTEGER NOT NULL,
                full_text TEXT,
                UNIQUE(title, publish_date)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_news_publish_date ON news(publish_date)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
