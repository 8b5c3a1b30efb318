use std::{sync::Arc, time::Duration};

use anyhow::Result;
use futures::future::join_all;
use reqwest::Client;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle, time::timeout};
use tokio_cron_scheduler::JobScheduler;

use crate::{
    background::Background,
    broadcast::{event_bus, IframeSlot, LogSurface, ResultBroadcaster, Surface},
    classifier::BackendClient,
    config::AppConfig,
    db::{self, settings::SettingsRepository},
    inbox::spawn_stdin_inbox,
    infrastructure::{
        directories::ResolvedPaths,
        shutdown::{drain, Shutdown, ShutdownListener},
    },
    session::{
        page::{SnapshotPage, SnapshotWatcher},
        SessionEvent, TabSession,
    },
    tasks::scheduler::{configure_link_sweep, SweepCallback},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct ShieldBoxApp {
    paths: ResolvedPaths,
    background: Arc<Background>,
    scheduler: JobScheduler,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: Shutdown,
}

impl ShieldBoxApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let pool = db::init_pool(&paths.db_path).await?;
        let repository = SettingsRepository::new(pool);

        let http_client = Client::builder()
            .user_agent(format!("shieldbox/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let classifier = Arc::new(BackendClient::new(http_client, &config.backend));

        let iframe: Arc<dyn Surface> = Arc::new(IframeSlot::absent());
        let broadcaster = ResultBroadcaster::new(event_bus()).with_iframe(iframe);
        let panel = spawn_panel(&broadcaster, shutdown.subscribe());

        let background = Arc::new(
            Background::initialize(classifier, config.backend.clone(), repository, broadcaster)
                .await?,
        );

        let page = Arc::new(SnapshotPage::new(&paths.snapshot_path));
        page.refresh().await;
        let (session, handle) = TabSession::new(&config.scan, page.clone(), background.clone());
        let session_task = session.spawn(shutdown.subscribe());
        let watcher = SnapshotWatcher::new(page, config.page.change_poll_interval, handle.clone())
            .spawn(shutdown.subscribe());
        let inbox = spawn_stdin_inbox(background.clone(), handle.clone(), shutdown.subscribe());

        let sweep: SweepCallback = Arc::new(move || {
            handle.try_send(SessionEvent::SweepLinks);
        });
        let scheduler = configure_link_sweep(&config.scheduler.link_sweep_cron, sweep).await?;

        Ok(Self {
            paths,
            background,
            scheduler,
            tasks: vec![
                ("watcher", watcher),
                ("inbox", inbox),
                ("session", session_task),
                ("panel", panel),
            ],
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let ShieldBoxApp {
            paths,
            background,
            mut scheduler,
            tasks,
            shutdown,
        } = self;

        tracing::info!(
            snapshot = %paths.snapshot_path.display(),
            db = %paths.db_path.display(),
            "ShieldBox started"
        );

        let mut shutdown_listener = shutdown.subscribe();
        shutdown_listener.notified().await;
        tracing::info!("shutdown signal received (CTRL+C / SIGTERM)");

        shutdown.trigger();

        match timeout(SHUTDOWN_GRACE, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(?err, "failed to stop scheduler");
            }
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    "scheduler did not stop within {:?}",
                    SHUTDOWN_GRACE
                );
            }
        }

        join_all(
            tasks
                .into_iter()
                .map(|(name, handle)| drain(name, handle, SHUTDOWN_GRACE)),
        )
        .await;

        if timeout(SHUTDOWN_GRACE, background.close()).await.is_err() {
            tracing::warn!(
                target: "db",
                "settings store did not close within {:?}",
                SHUTDOWN_GRACE
            );
        }

        tracing::info!("ShieldBox stopped");
        Ok(())
    }
}

/// Feeds the bus into the log surface, standing in for popup and panel.
fn spawn_panel(broadcaster: &ResultBroadcaster, mut shutdown: ShutdownListener) -> JoinHandle<()> {
    let mut events = broadcaster.subscribe();
    tokio::spawn(async move {
        let surface = LogSurface;
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = shutdown.notified() => break,
            };
            match event {
                Ok(event) => {
                    let _ = surface.deliver(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "panel", skipped, "panel fell behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
