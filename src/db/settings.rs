use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, sqlite::SqlitePool};

use crate::domain::{AutoScanSettings, EmailId, ScanResult};

const AUTO_SCAN_KEY: &str = "auto_scan_settings";
const LATEST_SCAN_KEY: &str = "latest_auto_scan";

/// Most recent automatic email verdict, kept so the popup can show it
/// without rescanning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestScan {
    pub email_id: EmailId,
    pub result: ScanResult,
    pub saved_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Falls back to defaults when nothing is stored or the stored value no
    /// longer parses.
    pub async fn auto_scan(&self) -> Result<AutoScanSettings> {
        let Some(raw) = self.get(AUTO_SCAN_KEY).await? else {
            return Ok(AutoScanSettings::default());
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::warn!(target: "db", error = %err, "stored auto-scan settings unreadable; using defaults");
                Ok(AutoScanSettings::default())
            }
        }
    }

    pub async fn save_auto_scan(&self, settings: &AutoScanSettings) -> Result<()> {
        let raw = serde_json::to_string(settings).context("serialize auto-scan settings")?;
        self.put(AUTO_SCAN_KEY, &raw).await
    }

    pub async fn save_latest(&self, email_id: &EmailId, result: &ScanResult) -> Result<()> {
        let latest = LatestScan {
            email_id: email_id.clone(),
            result: result.clone(),
            saved_at: Utc::now(),
        };
        let raw = serde_json::to_string(&latest).context("serialize latest scan")?;
        self.put(LATEST_SCAN_KEY, &raw).await
    }

    pub async fn latest(&self) -> Result<Option<LatestScan>> {
        let Some(raw) = self.get(LATEST_SCAN_KEY).await? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = query_as(r#"SELECT value FROM settings WHERE key = ?1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        query(
            r#"INSERT OR REPLACE INTO settings (key, value, updated_at)
                VALUES (?1, ?2, CURRENT_TIMESTAMP)"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
