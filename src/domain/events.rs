use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{EmailId, ScanResult, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    LocalQuickScan,
    LocalOnly,
    MlModel,
}

/// Verdict for a single outbound link, either provisional or final.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkScanUpdate {
    pub request_id: u64,
    pub url: String,
    pub status: Verdict,
    pub confidence: f32,
    pub details: String,
    pub analysis_type: AnalysisType,
    pub at: DateTime<Utc>,
}

/// Everything a UI surface can be told. Payloads are shared behind `Arc`
/// so every surface receiving one event sees the same value.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UiEvent {
    Scanning {
        email_id: EmailId,
        subject: String,
        sender: String,
        body_length: usize,
        at: DateTime<Utc>,
    },
    EmailResult {
        email_id: EmailId,
        result: Arc<ScanResult>,
        cached: bool,
    },
    NoEmail {
        reason: String,
        at: DateTime<Utc>,
    },
    LinkUpdate(LinkScanUpdate),
    DangerousLinks {
        urls: Vec<String>,
    },
    PhishingWarning {
        count: usize,
    },
    PanelVisibility {
        visible: bool,
    },
}

impl UiEvent {
    pub fn no_email(reason: impl Into<String>) -> Self {
        UiEvent::NoEmail {
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UiEvent::Scanning { .. } => "scanning",
            UiEvent::EmailResult { .. } => "email_result",
            UiEvent::NoEmail { .. } => "no_email",
            UiEvent::LinkUpdate(_) => "link_update",
            UiEvent::DangerousLinks { .. } => "dangerous_links",
            UiEvent::PhishingWarning { .. } => "phishing_warning",
            UiEvent::PanelVisibility { .. } => "panel_visibility",
        }
    }
}
