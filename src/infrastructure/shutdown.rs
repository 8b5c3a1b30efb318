use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle, time::timeout};

#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, ShutdownListener { receiver })
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

impl ShutdownListener {
    pub async fn notified(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        let _ = self.receiver.changed().await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Waits for a background task to wind down, aborting it after `grace`.
pub async fn drain(name: &'static str, mut handle: JoinHandle<()>, grace: Duration) {
    match timeout(grace, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) if err.is_panic() => {
            tracing::error!(target: "shutdown", task = name, "task panicked");
        }
        Ok(Err(_)) => {}
        Err(_) => {
            tracing::warn!(
                target: "shutdown",
                task = name,
                "task did not stop within {:?}; aborting",
                grace
            );
            handle.abort();
        }
    }
}

pub fn install_signal_handlers(shutdown: Shutdown) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc.trigger();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                term.trigger();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use super::*;

    #[tokio::test]
    async fn listeners_created_after_trigger_see_it() {
        let (shutdown, mut early) = Shutdown::new();
        shutdown.trigger();
        early.notified().await;
        let late = shutdown.subscribe();
        assert!(late.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_aborts_stuck_tasks() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            flag.store(true, Ordering::SeqCst);
        });

        drain("stuck", handle, Duration::from_secs(1)).await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
