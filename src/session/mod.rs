pub mod page;

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    background::{Background, Command, Response},
    broadcast::ReplySlot,
    config::ScanConfig,
    domain::{AutoScanSettings, EmailId, ScanResult, UiEvent},
    infrastructure::shutdown::ShutdownListener,
    scan::{
        ContextSnapshot, EmailScanRequest, PageSource, ScanCoordinator, ScanDispatcher,
        TickOutcome, Trigger,
    },
};

const SESSION_QUEUE: usize = 64;

/// Everything that can wake a page session. Handled one at a time.
#[derive(Debug)]
pub enum SessionEvent {
    Poll,
    PossibleChange,
    UrlChanged,
    Manual { reply: Option<ReplySlot> },
    SweepLinks,
    Settled {
        email_id: EmailId,
        generation: u64,
        result: ScanResult,
    },
    CacheSnapshot { reply: oneshot::Sender<ContextSnapshot> },
    ClearCache,
}

/// Debug operations on a running session, addressed the same way as
/// background commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SessionCommand {
    ScanCurrentEmail,
    ShowCache,
    ClearCache,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionReply {
    Event(Arc<UiEvent>),
    Cache(ContextSnapshot),
    Ack,
    SessionClosed,
}

#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Returns `false` once the session has stopped.
    pub async fn send(&self, event: SessionEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Non-blocking variant for synchronous callers such as cron jobs.
    pub fn try_send(&self, event: SessionEvent) -> bool {
        match self.events.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(target: "session", error = %err, "session event dropped");
                false
            }
        }
    }

    /// Scans the open email on demand and waits for the verdict, or for
    /// the "no email" status when nothing is open.
    pub async fn manual_scan(&self) -> Option<Arc<UiEvent>> {
        let (reply, answer) = oneshot::channel();
        if !self.send(SessionEvent::Manual { reply: Some(reply) }).await {
            return None;
        }
        answer.await.ok()
    }

    pub async fn cache_snapshot(&self) -> Option<ContextSnapshot> {
        let (reply, answer) = oneshot::channel();
        if !self.send(SessionEvent::CacheSnapshot { reply }).await {
            return None;
        }
        answer.await.ok()
    }

    pub async fn clear_cache(&self) -> bool {
        self.send(SessionEvent::ClearCache).await
    }

    pub async fn execute(&self, command: SessionCommand) -> SessionReply {
        let reply = match command {
            SessionCommand::ScanCurrentEmail => self.manual_scan().await.map(SessionReply::Event),
            SessionCommand::ShowCache => self.cache_snapshot().await.map(SessionReply::Cache),
            SessionCommand::ClearCache => self.clear_cache().await.then_some(SessionReply::Ack),
        };
        reply.unwrap_or(SessionReply::SessionClosed)
    }
}

/// Runs email scans on the background side and posts the verdict back to
/// the session that asked for it.
struct SessionDispatcher {
    background: Arc<Background>,
    events: mpsc::Sender<SessionEvent>,
}

impl ScanDispatcher for SessionDispatcher {
    fn dispatch(&self, request: EmailScanRequest) {
        let background = self.background.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let EmailScanRequest {
                email_id,
                content,
                manual,
                generation,
            } = request;
            let result = background.scan_auto_email(&email_id, &content).await;
            tracing::debug!(
                target: "session",
                email_id = %email_id,
                manual,
                status = %result.status,
                "email scan returned"
            );
            let settled = SessionEvent::Settled {
                email_id,
                generation,
                result,
            };
            if events.send(settled).await.is_err() {
                tracing::debug!(target: "session", "session gone before scan settled");
            }
        });
    }
}

/// One watched page. Owns the coordinator and its scan context; nothing
/// else touches them.
pub struct TabSession {
    coordinator: ScanCoordinator,
    page: Arc<dyn PageSource>,
    background: Arc<Background>,
    events: mpsc::Receiver<SessionEvent>,
    settings: watch::Receiver<AutoScanSettings>,
    poll_interval: Duration,
}

impl TabSession {
    pub fn new(
        config: &ScanConfig,
        page: Arc<dyn PageSource>,
        background: Arc<Background>,
    ) -> (Self, SessionHandle) {
        let (sender, events) = mpsc::channel(SESSION_QUEUE);
        let dispatcher = Arc::new(SessionDispatcher {
            background: background.clone(),
            events: sender.clone(),
        });
        let mut coordinator = ScanCoordinator::new(
            config.cache_capacity,
            config.url_batch_limit,
            background.broadcaster().clone(),
            dispatcher,
        );
        let settings = background.settings();
        coordinator.set_auto_scan(settings.borrow().enabled);

        let session = Self {
            coordinator,
            page,
            background,
            events,
            settings,
            poll_interval: config.poll_interval,
        };
        (session, SessionHandle { events: sender })
    }

    pub fn spawn(self, shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, mut shutdown: ShutdownListener) {
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut settings_open = true;

        tracing::info!(
            target: "session",
            poll_ms = self.poll_interval.as_millis() as u64,
            "page session started"
        );
        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                _ = ticker.tick() => self.handle(SessionEvent::Poll),
                changed = self.settings.changed(), if settings_open => {
                    if changed.is_err() {
                        settings_open = false;
                        continue;
                    }
                    let enabled = self.settings.borrow_and_update().enabled;
                    self.coordinator.set_auto_scan(enabled);
                }
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }
        let snapshot = self.coordinator.snapshot();
        tracing::info!(
            target: "session",
            cached = snapshot.cached,
            scanned = snapshot.scanned,
            submitted_urls = snapshot.submitted_urls,
            "page session stopped"
        );
    }

    fn handle(&mut self, event: SessionEvent) {
        let page = self.page.as_ref();
        let outcome = match event {
            SessionEvent::Poll => Some(self.coordinator.tick(Trigger::Poll, page)),
            SessionEvent::PossibleChange => {
                Some(self.coordinator.tick(Trigger::PossibleChange, page))
            }
            SessionEvent::UrlChanged => self.coordinator.navigate(page),
            SessionEvent::Manual { reply: Some(reply) } => {
                Some(self.coordinator.tick_with_reply(Trigger::Manual, page, reply))
            }
            SessionEvent::Manual { reply: None } => {
                Some(self.coordinator.tick(Trigger::Manual, page))
            }
            SessionEvent::SweepLinks => {
                self.sweep_links();
                None
            }
            SessionEvent::Settled {
                email_id,
                generation,
                result,
            } => {
                self.coordinator.settle(email_id, generation, result);
                None
            }
            SessionEvent::CacheSnapshot { reply } => {
                let _ = reply.send(self.coordinator.snapshot());
                None
            }
            SessionEvent::ClearCache => {
                self.coordinator.clear();
                None
            }
        };
        if let Some(outcome) = outcome {
            if !matches!(outcome, TickOutcome::Unchanged(_) | TickOutcome::Disabled) {
                tracing::debug!(target: "session", ?outcome, "tick");
            }
        }
    }

    fn sweep_links(&mut self) {
        let urls = self.coordinator.collect_new_links(self.page.as_ref());
        if urls.is_empty() {
            return;
        }
        tracing::info!(target: "session", count = urls.len(), "sweeping new page links");
        let background = self.background.clone();
        tokio::spawn(async move {
            match background.handle(Command::AutoScanUrls { urls }).await {
                Response::UrlBatch { results } => {
                    tracing::debug!(target: "session", scanned = results.len(), "link sweep finished");
                }
                other => {
                    tracing::debug!(target: "session", response = ?other, "link sweep skipped");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::TempDir;
    use tokio::{sync::broadcast, time::timeout};

    use super::*;
    use crate::{
        classifier::{ClassifyError, LinkVerdict, RemoteClassifier},
        domain::{ExtractedContent, LinkStatus, SettingsPatch, Verdict},
        infrastructure::shutdown::Shutdown,
        test_support::{background_with, BackgroundFixture},
    };

    #[derive(Default)]
    struct CountingClassifier {
        emails: Mutex<usize>,
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl RemoteClassifier for CountingClassifier {
        async fn classify_link(
            &self,
            _url: &str,
            _timeout: Duration,
        ) -> Result<LinkVerdict, ClassifyError> {
            Err(ClassifyError::Timeout)
        }

        async fn classify_email_links(
            &self,
            _email: &ExtractedContent,
            _timeout: Duration,
        ) -> Result<ScanResult, ClassifyError> {
            *self.emails.lock() += 1;
            Ok(ScanResult::new(Verdict::Phishing, "Phishing detected!", "").with_confidence(0.9))
        }

        async fn classify_urls(
            &self,
            urls: &[String],
            _timeout: Duration,
        ) -> Result<Vec<LinkStatus>, ClassifyError> {
            self.batches.lock().push(urls.to_vec());
            Ok(urls
                .iter()
                .map(|url| LinkStatus {
                    url: url.clone(),
                    status: Verdict::Safe,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct StaticPage {
        email: Mutex<Option<ExtractedContent>>,
        links: Vec<String>,
    }

    impl PageSource for StaticPage {
        fn extract(&self) -> anyhow::Result<Option<ExtractedContent>> {
            Ok(self.email.lock().clone())
        }

        fn location(&self) -> String {
            "https://mail.google.com/mail/u/0/#inbox/FMfcgzQZ".into()
        }

        fn links(&self) -> Vec<String> {
            self.links.clone()
        }
    }

    struct Running {
        _dir: TempDir,
        classifier: Arc<CountingClassifier>,
        background: Arc<Background>,
        handle: SessionHandle,
        events: broadcast::Receiver<Arc<UiEvent>>,
        shutdown: Shutdown,
        task: JoinHandle<()>,
    }

    async fn start(page: StaticPage) -> Running {
        let classifier = Arc::new(CountingClassifier::default());
        let BackgroundFixture {
            dir,
            background,
            events,
        } = background_with(classifier.clone()).await;
        let background = Arc::new(background);
        let config = ScanConfig {
            poll_interval: Duration::from_secs(3600),
            ..ScanConfig::default()
        };
        let (session, handle) = TabSession::new(&config, Arc::new(page), background.clone());
        let (shutdown, _) = Shutdown::new();
        let task = session.spawn(shutdown.subscribe());
        Running {
            _dir: dir,
            classifier,
            background,
            handle,
            events,
            shutdown,
            task,
        }
    }

    fn open_email() -> StaticPage {
        StaticPage {
            email: Mutex::new(Some(ExtractedContent {
                subject: "Verify your account".into(),
                sender: "a@b.com".into(),
                body: "http://bit.ly/xyz click here to verify".into(),
                links: vec!["http://bit.ly/xyz".into()],
                ..Default::default()
            })),
            links: vec![
                "http://bit.ly/xyz".into(),
                "https://example.com/about".into(),
                "mailto:a@b.com".into(),
            ],
        }
    }

    async fn next_result(events: &mut broadcast::Receiver<Arc<UiEvent>>) -> Arc<UiEvent> {
        timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.unwrap();
                if matches!(event.as_ref(), UiEvent::EmailResult { .. }) {
                    return event;
                }
            }
        })
        .await
        .expect("email result in time")
    }

    #[tokio::test]
    async fn change_storm_scans_once_then_caches() {
        let mut running = start(open_email()).await;
        for _ in 0..3 {
            assert!(running.handle.send(SessionEvent::PossibleChange).await);
        }

        let result = next_result(&mut running.events).await;
        assert!(matches!(result.as_ref(), UiEvent::EmailResult { cached: false, .. }));

        let snapshot = running.handle.cache_snapshot().await.unwrap();
        assert_eq!(snapshot.cached, 1);
        assert_eq!(snapshot.scanned, 1);
        assert!(snapshot.pending.is_some());
        assert_eq!(*running.classifier.emails.lock(), 1);

        running.shutdown.trigger();
        running.task.await.unwrap();
    }

    #[tokio::test]
    async fn manual_scan_replies_with_verdict() {
        let running = start(open_email()).await;
        let answer = running.handle.manual_scan().await.unwrap();
        let UiEvent::EmailResult { result, cached, .. } = answer.as_ref() else {
            panic!("expected an email result, got {answer:?}");
        };
        assert!(!cached);
        assert_eq!(result.status, Verdict::Phishing);

        let again = running.handle.manual_scan().await.unwrap();
        assert!(matches!(again.as_ref(), UiEvent::EmailResult { cached: true, .. }));
        assert_eq!(*running.classifier.emails.lock(), 1);

        running.shutdown.trigger();
        running.task.await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_manual_scans_both_get_the_verdict() {
        let running = start(open_email()).await;
        let (first, second) =
            tokio::join!(running.handle.manual_scan(), running.handle.manual_scan());

        for answer in [first.unwrap(), second.unwrap()] {
            let UiEvent::EmailResult { result, .. } = answer.as_ref() else {
                panic!("expected an email result, got {answer:?}");
            };
            assert_eq!(result.status, Verdict::Phishing);
        }
        assert_eq!(*running.classifier.emails.lock(), 1);

        running.shutdown.trigger();
        running.task.await.unwrap();
    }

    #[tokio::test]
    async fn manual_scan_without_email_reports_no_email() {
        let running = start(StaticPage::default()).await;
        let answer = running.handle.manual_scan().await.unwrap();
        assert!(matches!(answer.as_ref(), UiEvent::NoEmail { .. }));
        assert_eq!(*running.classifier.emails.lock(), 0);
        running.shutdown.trigger();
        running.task.await.unwrap();
    }

    #[tokio::test]
    async fn link_sweep_submits_each_http_link_once() {
        let running = start(open_email()).await;
        assert!(running.handle.send(SessionEvent::SweepLinks).await);
        assert!(running.handle.send(SessionEvent::SweepLinks).await);
        running.handle.cache_snapshot().await.unwrap();

        timeout(Duration::from_secs(5), async {
            while running.classifier.batches.lock().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let batches = running.classifier.batches.lock().clone();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec!["http://bit.ly/xyz".to_string(), "https://example.com/about".to_string()]
        );

        let snapshot = running.handle.cache_snapshot().await.unwrap();
        assert_eq!(snapshot.submitted_urls, 2);
        running.shutdown.trigger();
        running.task.await.unwrap();
    }

    #[tokio::test]
    async fn disabling_auto_scan_stops_automatic_scans() {
        let running = start(open_email()).await;
        running
            .background
            .handle(Command::UpdateAutoScanSettings {
                settings: SettingsPatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            })
            .await;
        tokio::task::yield_now().await;

        assert!(running.handle.send(SessionEvent::Poll).await);
        let snapshot = running.handle.cache_snapshot().await.unwrap();
        assert!(snapshot.pending.is_none());
        assert_eq!(*running.classifier.emails.lock(), 0);

        running.shutdown.trigger();
        running.task.await.unwrap();
    }

    #[tokio::test]
    async fn clear_cache_forgets_scanned_emails() {
        let mut running = start(open_email()).await;
        running.handle.send(SessionEvent::Poll).await;
        next_result(&mut running.events).await;

        assert!(running.handle.clear_cache().await);
        let snapshot = running.handle.cache_snapshot().await.unwrap();
        assert_eq!(snapshot.cached, 0);
        assert_eq!(snapshot.scanned, 0);
        assert!(snapshot.pending.is_none());

        running.shutdown.trigger();
        running.task.await.unwrap();
    }
}
