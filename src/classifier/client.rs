use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::{
    config::BackendConfig,
    domain::{ExtractedContent, LinkStatus, ScanResult},
};

use super::{
    wire::{
        normalize_email_response, normalize_link_response, normalize_url_batch, EmailLinksRequest,
        EmailLinksResponse, LinkRequest, LinkResponse, UrlBatchRequest, UrlBatchResponse,
    },
    ClassifyError, LinkVerdict, RemoteClassifier,
};

const SCAN_LINK_PATH: &str = "scan-link";
const SCAN_EMAIL_LINKS_PATH: &str = "scan-email-links";
const AUTO_SCAN_PATH: &str = "auto-scan";

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(http: Client, config: &BackendConfig) -> Self {
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClassifyError> {
        self.base_url
            .join(path)
            .map_err(|err| ClassifyError::Malformed(format!("invalid endpoint {path}: {err}")))
    }

    async fn post<B, R>(&self, path: &str, body: &B, timeout: Duration) -> Result<R, ClassifyError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(ClassifyError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Status(status));
        }

        response.json::<R>().await.map_err(|err| {
            if err.is_timeout() {
                ClassifyError::Timeout
            } else {
                ClassifyError::Malformed(err.to_string())
            }
        })
    }
}

#[async_trait]
impl RemoteClassifier for BackendClient {
    async fn classify_link(&self, url: &str, timeout: Duration) -> Result<LinkVerdict, ClassifyError> {
        let response: LinkResponse = self
            .post(SCAN_LINK_PATH, &LinkRequest { url }, timeout)
            .await?;
        normalize_link_response(url, response)
    }

    async fn classify_email_links(
        &self,
        email: &ExtractedContent,
        timeout: Duration,
    ) -> Result<ScanResult, ClassifyError> {
        let request = EmailLinksRequest {
            body: &email.body,
            subject: &email.subject,
            sender: &email.sender,
            timestamp: Utc::now().to_rfc3339(),
        };
        let response: EmailLinksResponse = self.post(SCAN_EMAIL_LINKS_PATH, &request, timeout).await?;
        Ok(normalize_email_response(response))
    }

    async fn classify_urls(
        &self,
        urls: &[String],
        timeout: Duration,
    ) -> Result<Vec<LinkStatus>, ClassifyError> {
        let response: UrlBatchResponse = self
            .post(AUTO_SCAN_PATH, &UrlBatchRequest { urls }, timeout)
            .await?;
        normalize_url_batch(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> BackendClient {
        let config = BackendConfig {
            base_url: Url::parse(base).unwrap(),
            link_timeout: Duration::from_secs(3),
            email_timeout: Duration::from_secs(10),
            url_batch_timeout: Duration::from_secs(5),
        };
        BackendClient::new(Client::new(), &config)
    }

    #[test]
    fn endpoint_joins_under_base_path() {
        let client = client("http://127.0.0.1:5000/api");
        assert_eq!(
            client.endpoint(SCAN_LINK_PATH).unwrap().as_str(),
            "http://127.0.0.1:5000/api/scan-link"
        );
    }

    #[test]
    fn endpoint_without_base_path() {
        let client = client("http://127.0.0.1:5000");
        assert_eq!(
            client.endpoint(AUTO_SCAN_PATH).unwrap().as_str(),
            "http://127.0.0.1:5000/auto-scan"
        );
    }
}
