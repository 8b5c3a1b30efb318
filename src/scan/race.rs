use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::Utc;
use tokio::{task::JoinHandle, time::sleep};

use crate::{
    broadcast::ResultBroadcaster,
    classifier::{details::link_details, local, ClassifyError, RemoteClassifier},
    domain::{AnalysisType, LinkScanUpdate, UiEvent, Verdict},
};

use super::sanitize::prepare_for_scan;

pub struct LinkScanTicket {
    /// Local keyword verdict, available immediately.
    pub provisional: LinkScanUpdate,
    /// Resolves to the single follow-up update once the race settles.
    pub settled: JoinHandle<LinkScanUpdate>,
}

/// Answers link scans with a local verdict right away, then races the
/// remote classifier against a deadline and pushes exactly one update.
#[derive(Clone)]
pub struct LinkRace {
    classifier: Arc<dyn RemoteClassifier>,
    broadcaster: ResultBroadcaster,
    next_request: Arc<AtomicU64>,
}

impl LinkRace {
    pub fn new(classifier: Arc<dyn RemoteClassifier>, broadcaster: ResultBroadcaster) -> Self {
        Self {
            classifier,
            broadcaster,
            next_request: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Returns `None` for a blank URL.
    pub fn start(&self, raw_url: &str, timeout: Duration) -> Option<LinkScanTicket> {
        if raw_url.trim().is_empty() {
            return None;
        }
        let url = prepare_for_scan(raw_url);
        let local = local::classify_url(&url);
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(target: "race", request_id, url = %url, local = %local, "link scan started");

        let provisional = LinkScanUpdate {
            request_id,
            url: url.clone(),
            status: local,
            confidence: local::url_confidence(local),
            details: "Analyzing URL with ML model...".into(),
            analysis_type: AnalysisType::LocalQuickScan,
            at: Utc::now(),
        };

        let classifier = self.classifier.clone();
        let broadcaster = self.broadcaster.clone();
        let settled = tokio::spawn(async move {
            let update = race_remote(classifier.as_ref(), request_id, url, local, timeout).await;
            broadcaster.broadcast(UiEvent::LinkUpdate(update.clone()));
            update
        });

        Some(LinkScanTicket {
            provisional,
            settled,
        })
    }
}

/// Whichever of the deadline and the remote call finishes first decides the
/// update; the other branch is dropped, which also aborts the request.
async fn race_remote(
    classifier: &dyn RemoteClassifier,
    request_id: u64,
    url: String,
    local: Verdict,
    timeout: Duration,
) -> LinkScanUpdate {
    let outcome = tokio::select! {
        res = classifier.classify_link(&url, timeout) => res,
        _ = sleep(timeout) => Err(ClassifyError::Timeout),
    };

    match outcome {
        Ok(verdict) => {
            tracing::debug!(
                target: "race",
                request_id,
                status = %verdict.status,
                confidence = verdict.confidence,
                "remote verdict won"
            );
            LinkScanUpdate {
                request_id,
                details: link_details(
                    verdict.status,
                    verdict.confidence,
                    verdict.suspicious_keywords,
                    verdict.url_length,
                ),
                url: verdict.url,
                status: verdict.status,
                confidence: verdict.confidence,
                analysis_type: AnalysisType::MlModel,
                at: Utc::now(),
            }
        }
        Err(err) => {
            tracing::info!(target: "race", request_id, error = %err, "falling back to local verdict");
            local_only(request_id, url, local, &err)
        }
    }
}

fn local_only(request_id: u64, url: String, local: Verdict, err: &ClassifyError) -> LinkScanUpdate {
    let prefix = if err.is_timeout() {
        "Backend server timeout. Using local scan only."
    } else {
        "Backend server unavailable. Using local scan only."
    };
    let suffix = if local == Verdict::Phishing {
        "This URL contains suspicious patterns."
    } else {
        "No obvious threats detected."
    };
    LinkScanUpdate {
        request_id,
        url,
        status: local,
        confidence: local::url_confidence(local),
        details: format!("{prefix} {suffix}"),
        analysis_type: AnalysisType::LocalOnly,
        at: Utc::now(),
    }
}
