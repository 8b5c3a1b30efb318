use std::io;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{config::AppConfig, infrastructure::directories::ResolvedPaths};

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Dependencies that are chatty at `debug` and rarely interesting here.
const QUIET_DEPENDENCIES: [&str; 3] = ["sqlx=warn", "hyper=info", "tokio_cron_scheduler=info"];

pub fn init_tracing(config: &AppConfig, paths: &ResolvedPaths) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, "shieldbox.log");
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stdout)
            .with_target(true)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(build_filter(&config.logging.level))
            .with(console_layer)
            .with(file_layer)
            .init();

        tracing::info!(logs = %paths.logs_dir.display(), "tracing initialized");
        Ok(())
    })?;
    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level, quieting noisy
/// dependencies unless the level already names them.
fn build_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let mut directives = vec![level.trim().to_string()];
    for quiet in QUIET_DEPENDENCIES {
        let target = quiet.split('=').next().unwrap_or(quiet);
        if !level.contains(target) {
            directives.push(quiet.to_string());
        }
    }
    EnvFilter::try_new(directives.join(",")).unwrap_or_else(|_| EnvFilter::new("info"))
}
