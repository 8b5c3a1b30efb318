mod command;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::watch;

use crate::{
    broadcast::ResultBroadcaster,
    classifier::{details::ThreatDetails, local, ClassifyError, RemoteClassifier},
    config::BackendConfig,
    db::settings::SettingsRepository,
    domain::{
        AutoScanSettings, EmailId, ExtractedContent, LinkStatus, ResultOrigin, ScanResult,
        SettingsPatch, UiEvent, Verdict,
    },
    scan::{identity::derive_id, LinkRace, LinkScanTicket},
};

pub use command::{Command, Response};

const RESTRICTED_PREFIXES: [&str; 3] = [
    "chrome://",
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com",
];

/// The long-lived side that talks to the classification service, owns the
/// persisted preferences and answers every [`Command`].
pub struct Background {
    classifier: Arc<dyn RemoteClassifier>,
    backend: BackendConfig,
    repository: SettingsRepository,
    settings: watch::Sender<AutoScanSettings>,
    panel_visible: AtomicBool,
    broadcaster: ResultBroadcaster,
    race: LinkRace,
}

impl Background {
    pub async fn initialize(
        classifier: Arc<dyn RemoteClassifier>,
        backend: BackendConfig,
        repository: SettingsRepository,
        broadcaster: ResultBroadcaster,
    ) -> anyhow::Result<Self> {
        let stored = repository.auto_scan().await?;
        tracing::info!(
            target: "background",
            enabled = stored.enabled,
            interval_ms = stored.scan_interval_ms,
            "auto-scan settings loaded"
        );
        let (settings, _) = watch::channel(stored);
        let race = LinkRace::new(classifier.clone(), broadcaster.clone());
        Ok(Self {
            classifier,
            backend,
            repository,
            settings,
            panel_visible: AtomicBool::new(false),
            broadcaster,
            race,
        })
    }

    pub fn settings(&self) -> watch::Receiver<AutoScanSettings> {
        self.settings.subscribe()
    }

    pub fn broadcaster(&self) -> &ResultBroadcaster {
        &self.broadcaster
    }

    pub async fn close(&self) {
        self.repository.close().await;
    }

    pub async fn handle(&self, command: Command) -> Response {
        tracing::debug!(target: "background", action = command.label(), "command received");
        match command {
            Command::ScanLink { url } => self.scan_link(&url),
            Command::ScanEmail { content } => Response::EmailScan(self.scan_email(&content).await),
            Command::ScanAutoEmail { email_id, content } => {
                Response::EmailScan(self.scan_auto_email(&email_id, &content).await)
            }
            Command::AutoScanUrls { urls } => self.auto_scan_urls(&urls).await,
            Command::GetAutoScanPreference => Response::Settings(*self.settings.borrow()),
            Command::GetLatestScan => match self.repository.latest().await {
                Ok(latest) => Response::LatestScan { latest },
                Err(err) => Response::Failed {
                    error: err.to_string(),
                },
            },
            Command::UpdateAutoScanSettings { settings } => {
                Response::Settings(self.update_settings(settings).await)
            }
            Command::ResetScanStatus => {
                self.broadcaster
                    .broadcast(UiEvent::no_email("Open an email to scan it"));
                Response::Ack
            }
            Command::TogglePanel { visible, page_url } => self.toggle_panel(visible, &page_url),
            Command::ShowPhishingWarning { count } => {
                self.warn_phishing(count);
                Response::Ack
            }
        }
    }

    fn scan_link(&self, url: &str) -> Response {
        match self.race.start(url, self.backend.link_timeout) {
            Some(LinkScanTicket {
                provisional,
                settled,
            }) => {
                // Detached; the settled update reaches the UI over the bus.
                drop(settled);
                Response::LinkScan(provisional)
            }
            None => Response::Refused {
                reason: "No URL provided".into(),
            },
        }
    }

    /// Popup-initiated scan. Always reaches the service, bypassing any
    /// session cache, and announces the verdict on the bus.
    pub async fn scan_email(&self, content: &ExtractedContent) -> ScanResult {
        let result = self.classify_email(content).await;
        self.broadcaster.broadcast(UiEvent::EmailResult {
            email_id: derive_id(content, ""),
            result: Arc::new(result.clone()),
            cached: false,
        });
        result
    }

    /// Scan on behalf of a page session. The session caches and announces
    /// the verdict; here it is only persisted as the latest one.
    pub async fn scan_auto_email(&self, email_id: &EmailId, content: &ExtractedContent) -> ScanResult {
        let result = self.classify_email(content).await;
        if let Err(err) = self.repository.save_latest(email_id, &result).await {
            tracing::warn!(target: "settings", error = %err, "failed to persist latest scan");
        }
        result
    }

    async fn classify_email(&self, content: &ExtractedContent) -> ScanResult {
        match self
            .classifier
            .classify_email_links(content, self.backend.email_timeout)
            .await
        {
            Ok(result) => {
                if result.status.is_threat() {
                    tracing::warn!(
                        target: "background",
                        status = %result.status,
                        phishing_links = result.phishing_links().count(),
                        "threat detected in email"
                    );
                } else {
                    tracing::info!(
                        target: "background",
                        status = %result.status,
                        links = result.links.len(),
                        "email scan completed"
                    );
                }
                result
            }
            Err(err) => {
                tracing::warn!(target: "background", error = %err, "email scan failed");
                failed_email_result(&err, content)
            }
        }
    }

    async fn auto_scan_urls(&self, urls: &[String]) -> Response {
        let settings = *self.settings.borrow();
        if !settings.enabled {
            return Response::Disabled;
        }
        if urls.is_empty() {
            return Response::UrlBatch {
                results: Vec::new(),
            };
        }

        match self
            .classifier
            .classify_urls(urls, self.backend.url_batch_timeout)
            .await
        {
            Ok(results) => {
                let dangerous: Vec<String> = results
                    .iter()
                    .filter(|link| link.status == Verdict::Phishing)
                    .map(|link| link.url.clone())
                    .collect();
                tracing::info!(
                    target: "background",
                    submitted = urls.len(),
                    dangerous = dangerous.len(),
                    "url batch scanned"
                );
                if !dangerous.is_empty() {
                    let count = dangerous.len();
                    self.broadcaster
                        .broadcast(UiEvent::DangerousLinks { urls: dangerous });
                    if settings.notify_on_phishing {
                        self.warn_phishing(count);
                    }
                }
                Response::UrlBatch { results }
            }
            Err(err) => {
                tracing::warn!(target: "background", error = %err, "url batch scan failed");
                Response::Failed {
                    error: err.to_string(),
                }
            }
        }
    }

    async fn update_settings(&self, patch: SettingsPatch) -> AutoScanSettings {
        let merged = self.settings.borrow().merge(patch);
        if let Err(err) = self.repository.save_auto_scan(&merged).await {
            tracing::warn!(target: "settings", error = %err, "failed to persist auto-scan settings");
        }
        self.settings.send_replace(merged);
        tracing::info!(
            target: "settings",
            enabled = merged.enabled,
            interval_ms = merged.scan_interval_ms,
            "auto-scan settings updated"
        );
        merged
    }

    fn toggle_panel(&self, visible: Option<bool>, page_url: &str) -> Response {
        if RESTRICTED_PREFIXES
            .iter()
            .any(|prefix| page_url.starts_with(prefix))
        {
            return Response::Refused {
                reason: "ShieldBox cannot run on this page".into(),
            };
        }
        let visible = visible.unwrap_or_else(|| !self.panel_visible.load(Ordering::SeqCst));
        self.panel_visible.store(visible, Ordering::SeqCst);
        self.broadcaster
            .broadcast(UiEvent::PanelVisibility { visible });
        Response::Panel { visible }
    }

    fn warn_phishing(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.broadcaster
            .broadcast(UiEvent::PhishingWarning { count });
    }
}

/// Error verdict for a scan the service never answered. The keyword hint
/// rides along but never replaces the error status.
fn failed_email_result(err: &ClassifyError, content: &ExtractedContent) -> ScanResult {
    let message = if err.is_timeout() {
        "Scan timed out. The classification service did not respond in time."
    } else {
        "Classification service unavailable. Please try again later."
    };
    let hint = local::assess_email(&content.subject, &content.body);
    ScanResult::new(
        Verdict::Error,
        message,
        ThreatDetails::for_verdict(Verdict::Error).to_html(),
    )
    .with_origin(ResultOrigin::LocalFallback)
    .with_local_hint(hint.verdict)
    .with_links(
        content
            .links
            .iter()
            .map(|url| LinkStatus {
                url: url.clone(),
                status: local::classify_url(url),
            })
            .collect(),
    )
}
