use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use sqlx::{
    query,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};

pub mod settings;

const SETTINGS_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
"#;

/// Opens the key/value store that stands in for extension local storage,
/// creating the file and its schema on first run.
pub async fn init_pool(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("opening settings store at {}", db_path.display()))?;

    query(SETTINGS_SCHEMA).execute(&pool).await?;
    tracing::debug!(target: "db", path = %db_path.display(), "settings store ready");

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn reopening_keeps_existing_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db");

        let pool = init_pool(&path).await.unwrap();
        query("INSERT INTO settings (key, value) VALUES ('panel_visible', 'true')")
            .execute(&pool)
            .await
            .unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode, "wal");
        pool.close().await;

        let pool = init_pool(&path).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
