use std::{sync::Arc, time::Duration};

use tempfile::TempDir;
use tokio::sync::broadcast;

use crate::{
    background::Background,
    broadcast::{event_bus, ResultBroadcaster},
    classifier::RemoteClassifier,
    config::BackendConfig,
    db::{init_pool, settings::SettingsRepository},
    domain::UiEvent,
};

pub fn backend_config() -> BackendConfig {
    BackendConfig {
        base_url: "http://127.0.0.1:5000/".parse().unwrap(),
        link_timeout: Duration::from_secs(3),
        email_timeout: Duration::from_secs(10),
        url_batch_timeout: Duration::from_secs(5),
    }
}

/// A background over a throwaway sqlite file, plus a listener on its bus.
/// Keep `dir` alive for as long as the background is used.
pub struct BackgroundFixture {
    pub dir: TempDir,
    pub background: Background,
    pub events: broadcast::Receiver<Arc<UiEvent>>,
}

pub async fn background_with(classifier: Arc<dyn RemoteClassifier>) -> BackgroundFixture {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_pool(&dir.path().join("shieldbox.db")).await.unwrap();
    let bus = event_bus();
    let events = bus.subscribe();
    let background = Background::initialize(
        classifier,
        backend_config(),
        SettingsRepository::new(pool),
        ResultBroadcaster::new(bus),
    )
    .await
    .unwrap();
    BackgroundFixture {
        dir,
        background,
        events,
    }
}
