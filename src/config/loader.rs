use std::{env, time::Duration};

use super::env::{
    AppConfig, BackendConfig, ConfigError, DirectoryConfig, LoggingConfig, PageConfig, ScanConfig,
    SchedulerConfig,
};

const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_backend =
            env::var("SHIELDBOX_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        if raw_backend.trim().is_empty() {
            return Err(ConfigError::Missing("SHIELDBOX_BACKEND_URL"));
        }
        let base_url = url::Url::parse(raw_backend.trim()).map_err(|err| ConfigError::Invalid {
            key: "SHIELDBOX_BACKEND_URL",
            reason: err.to_string(),
        })?;

        let backend = BackendConfig {
            base_url,
            link_timeout: parse_millis("LINK_SCAN_TIMEOUT_MS", 3_000),
            email_timeout: parse_millis("EMAIL_SCAN_TIMEOUT_MS", 10_000),
            url_batch_timeout: parse_millis("URL_BATCH_TIMEOUT_MS", 5_000),
        };

        let defaults = ScanConfig::default();
        let scan = ScanConfig {
            poll_interval: parse_millis("EMAIL_POLL_INTERVAL_MS", 5_000),
            cache_capacity: parse_usize("SCAN_CACHE_CAPACITY")
                .filter(|cap| *cap > 0)
                .unwrap_or(defaults.cache_capacity),
            url_batch_limit: parse_usize("URL_BATCH_LIMIT").unwrap_or(defaults.url_batch_limit),
        };

        let page = PageConfig {
            snapshot_path: env::var("PAGE_SNAPSHOT_PATH").unwrap_or_else(|_| "page.json".to_string()),
            change_poll_interval: parse_millis("CHANGE_POLL_INTERVAL_MS", 500),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            db_filename: env::var("DB_FILENAME").unwrap_or_else(|_| "shieldbox.db".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let scheduler = SchedulerConfig {
            link_sweep_cron: env::var("LINK_SWEEP_CRON")
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| "0 */2 * * * *".to_string()),
        };

        Ok(Self {
            backend,
            scan,
            page,
            directories,
            logging,
            scheduler,
        })
    }
}

fn parse_usize(key: &str) -> Option<usize> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
}

fn parse_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(
        env::var(key)
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(default_ms),
    )
}
