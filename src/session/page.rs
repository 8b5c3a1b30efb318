use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::anyhow;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::{task::JoinHandle, time::sleep};

use crate::{domain::ExtractedContent, infrastructure::shutdown::ShutdownListener, scan::PageSource};

use super::{SessionEvent, SessionHandle};

/// What a page looked like at the moment it was captured.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSnapshot {
    pub url: String,
    pub email: Option<ExtractedContent>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone)]
enum Loaded {
    Missing,
    Ready(PageSnapshot),
    Broken(String),
}

/// Reads the page from a JSON snapshot on disk. A snapshot that fails to
/// parse surfaces as an extraction error, not as an empty page.
pub struct SnapshotPage {
    path: PathBuf,
    current: RwLock<Loaded>,
}

impl SnapshotPage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Loaded::Missing),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reloads the snapshot. Returns `true` when the page location moved.
    pub async fn refresh(&self) -> bool {
        let loaded = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str::<PageSnapshot>(&raw) {
                Ok(snapshot) => Loaded::Ready(snapshot),
                Err(err) => Loaded::Broken(err.to_string()),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Loaded::Missing,
            Err(err) => Loaded::Broken(err.to_string()),
        };
        let before = self.location();
        *self.current.write() = loaded;
        before != self.location()
    }
}

impl PageSource for SnapshotPage {
    fn extract(&self) -> anyhow::Result<Option<ExtractedContent>> {
        match &*self.current.read() {
            Loaded::Missing => Ok(None),
            Loaded::Ready(snapshot) => Ok(snapshot.email.clone()),
            Loaded::Broken(reason) => Err(anyhow!("page snapshot unreadable: {reason}")),
        }
    }

    fn location(&self) -> String {
        match &*self.current.read() {
            Loaded::Ready(snapshot) => snapshot.url.clone(),
            _ => String::new(),
        }
    }

    fn links(&self) -> Vec<String> {
        match &*self.current.read() {
            Loaded::Ready(snapshot) => snapshot.links.clone(),
            _ => Vec::new(),
        }
    }
}

/// Change notification for [`SnapshotPage`]: polls the file's modification
/// time and tells the session whenever the page may have changed.
pub struct SnapshotWatcher {
    page: Arc<SnapshotPage>,
    interval: Duration,
    session: SessionHandle,
}

impl SnapshotWatcher {
    pub fn new(page: Arc<SnapshotPage>, interval: Duration, session: SessionHandle) -> Self {
        Self {
            page,
            interval,
            session,
        }
    }

    pub fn spawn(self, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut seen: Option<SystemTime> = None;
            loop {
                if shutdown.is_triggered() {
                    break;
                }
                let modified = modified_at(self.page.path()).await;
                if modified != seen {
                    seen = modified;
                    let event = if self.page.refresh().await {
                        SessionEvent::UrlChanged
                    } else {
                        SessionEvent::PossibleChange
                    };
                    if !self.session.send(event).await {
                        break;
                    }
                }
                tokio::select! {
                    _ = sleep(self.interval) => {}
                    _ = shutdown.notified() => break,
                }
            }
            tracing::info!(target: "session", path = %self.page.path().display(), "snapshot watcher stopped");
        })
    }
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}
