mod client;
pub mod details;
pub mod local;
mod wire;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::domain::{ExtractedContent, LinkStatus, ScanResult, Verdict};

pub use client::BackendClient;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classification request timed out")]
    Timeout,
    #[error("classification service unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),
    #[error("classification service responded with status {0}")]
    Status(StatusCode),
    #[error("malformed classification response: {0}")]
    Malformed(String),
}

impl ClassifyError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClassifyError::Timeout)
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassifyError::Timeout
        } else {
            ClassifyError::Unavailable(err)
        }
    }
}

/// Remote verdict for one link, already normalized from the wire shape.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkVerdict {
    pub url: String,
    pub status: Verdict,
    pub confidence: f32,
    pub suspicious_keywords: bool,
    pub url_length: Option<usize>,
}

/// The remote classification service. Implementations reject with
/// [`ClassifyError`] on timeout, transport failure, non-OK status or an
/// unparseable body.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn classify_link(&self, url: &str, timeout: Duration) -> Result<LinkVerdict, ClassifyError>;

    async fn classify_email_links(
        &self,
        email: &ExtractedContent,
        timeout: Duration,
    ) -> Result<ScanResult, ClassifyError>;

    async fn classify_urls(
        &self,
        urls: &[String],
        timeout: Duration,
    ) -> Result<Vec<LinkStatus>, ClassifyError>;
}
