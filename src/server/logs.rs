//! Append-only processing log in SQLite.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS pdf_processing_logs (
    id TEXT PRIMARY KEY,
    tool TEXT NOT NULL,
    filename TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pdf_processing_logs_created_at
    ON pdf_processing_logs(created_at);
"#;

/// One row to append.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewLogEntry {
    pub tool: String,
    pub filename: String,
    pub status: String,
}

/// A stored row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LogEntry {
    pub id: String,
    pub tool: String,
    pub filename: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    /// Open (creating if missing) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn append(&self, entry: &NewLogEntry) -> Result<LogEntry, sqlx::Error> {
        let row = LogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            tool: entry.tool.clone(),
            filename: entry.filename.clone(),
            status: entry.status.clone(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        sqlx::query(
            r#"
            INSERT INTO pdf_processing_logs (id, tool, filename, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.tool)
        .bind(&row.filename)
        .bind(&row.status)
        .bind(&row.created_at)
        .execute(&self.pool)
        .await?;

        Ok(row)
    }

    /// Most recent rows first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<LogEntry>, sqlx::Error> {
        sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT id, tool, filename, status, created_at
            FROM pdf_processing_logs
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> LogStore {
        // One connection so every query sees the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = LogStore { pool };
        store.initialize_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn append_then_read_back() {
        let store = memory_store().await;
        let row = store
            .append(&NewLogEntry {
                tool: "merge".into(),
                filename: "a.pdf".into(),
                status: "success".into(),
            })
            .await
            .unwrap();
        let rows = store.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, row.id);
        assert_eq!(rows[0].tool, "merge");
    }

    #[tokio::test]
    async fn schema_is_idempotent() {
        let store = memory_store().await;
        store.initialize_schema().await.unwrap();
    }
}
