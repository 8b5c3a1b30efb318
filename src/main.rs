mod app;
mod background;
mod broadcast;
mod classifier;
mod config;
mod db;
mod domain;
mod inbox;
mod infrastructure;
mod scan;
mod session;
mod tasks;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories, &config.page)?;
    logging::init_tracing(&config, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::ShieldBoxApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}
