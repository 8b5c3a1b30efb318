use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub scan: ScanConfig,
    pub page: PageConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: url::Url,
    pub link_timeout: Duration,
    pub email_timeout: Duration,
    pub url_batch_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub poll_interval: Duration,
    pub cache_capacity: usize,
    pub url_batch_limit: usize,
}

#[derive(Debug, Clone)]
pub struct PageConfig {
    pub snapshot_path: String,
    pub change_poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub link_sweep_cron: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            cache_capacity: 50,
            url_batch_limit: 50,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
