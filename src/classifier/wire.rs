use serde::{Deserialize, Serialize};

use crate::domain::{LinkStatus, ScanResult, Verdict};

use super::{details::ThreatDetails, ClassifyError, LinkVerdict};

#[derive(Debug, Serialize)]
pub struct LinkRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Serialize)]
pub struct EmailLinksRequest<'a> {
    pub body: &'a str,
    pub subject: &'a str,
    pub sender: &'a str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct UrlBatchRequest<'a> {
    pub urls: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct LinkResponse {
    pub url: Option<String>,
    pub status: Option<String>,
    pub confidence: Option<f32>,
    #[serde(default)]
    pub suspicious_keywords_found: bool,
    pub debug_info: Option<DebugInfo>,
}

#[derive(Debug, Deserialize)]
pub struct DebugInfo {
    pub url_length: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailLinksResponse {
    pub status: Option<String>,
    pub email_status: Option<String>,
    pub confidence: Option<f32>,
    pub has_phishing: bool,
    pub link_count: Option<usize>,
    pub phishing_link_count: Option<usize>,
    pub links: Vec<WireLink>,
}

#[derive(Debug, Deserialize)]
pub struct WireLink {
    pub url: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlBatchResponse {
    pub status: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<WireLink>,
}

pub fn normalize_link_response(
    requested: &str,
    response: LinkResponse,
) -> Result<LinkVerdict, ClassifyError> {
    let status = response
        .status
        .as_deref()
        .map(Verdict::parse)
        .ok_or_else(|| ClassifyError::Malformed("link response missing status".into()))?;

    Ok(LinkVerdict {
        url: response.url.unwrap_or_else(|| requested.to_string()),
        status,
        confidence: response.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
        suspicious_keywords: response.suspicious_keywords_found,
        url_length: response.debug_info.and_then(|info| info.url_length),
    })
}

pub fn normalize_url_batch(response: UrlBatchResponse) -> Result<Vec<LinkStatus>, ClassifyError> {
    if response.status.as_deref() == Some("error") {
        return Err(ClassifyError::Malformed(
            response
                .message
                .unwrap_or_else(|| "auto-scan reported an error".into()),
        ));
    }
    Ok(response.results.into_iter().map(into_link_status).collect())
}

/// Collapses the service's several email response shapes into one result.
/// `email_status` wins when present; otherwise the link counts decide.
pub fn normalize_email_response(response: EmailLinksResponse) -> ScanResult {
    let link_count = response.link_count.unwrap_or(response.links.len());
    let links: Vec<LinkStatus> = response.links.into_iter().map(into_link_status).collect();
    let phishing_link_count = response
        .phishing_link_count
        .unwrap_or_else(|| links.iter().filter(|l| l.status == Verdict::Phishing).count());
    let raw_status = response.status.as_deref().map(str::to_ascii_lowercase);

    let (status, message) = if let Some(email_status) = response.email_status.as_deref() {
        let status = match Verdict::parse(email_status) {
            Verdict::Unknown | Verdict::Error => Verdict::Safe,
            other => other,
        };
        let message = match status {
            Verdict::Phishing => "Phishing email detected by ML analysis".to_string(),
            Verdict::Spam => "Spam email detected by ML analysis".to_string(),
            Verdict::Fraud => "Fraud detected by ML analysis".to_string(),
            Verdict::Malware => "Malware threat detected by ML analysis".to_string(),
            _ => "Email classified as safe by ML analysis".to_string(),
        };
        (status, message)
    } else if raw_status.as_deref() == Some("no_links") {
        (Verdict::Safe, "No links found in email".to_string())
    } else if raw_status.as_deref() == Some("phishing") || response.has_phishing {
        (
            Verdict::Phishing,
            format!("Phishing detected! {phishing_link_count} of {link_count} links are suspicious"),
        )
    } else {
        (
            Verdict::Safe,
            format!("Email appears safe. {link_count} links checked"),
        )
    };

    let mut details = ThreatDetails::for_verdict(status);
    match status {
        Verdict::Phishing if phishing_link_count > 0 => {
            details.description = format!(
                "Detected {phishing_link_count} suspicious link(s) in this email that may be phishing attempts."
            );
            details.recommendation = "Avoid clicking any links in this email. Verify the sender's identity before taking any action.".into();
        }
        Verdict::Safe if link_count > 0 => {
            details.description =
                format!("Scanned {link_count} link(s) in this email - all appear legitimate.");
        }
        _ => {}
    }

    let mut result = ScanResult::new(status, message, details.to_html()).with_links(links);
    if let Some(confidence) = response.confidence {
        result = result.with_confidence(confidence);
    }
    result
}

fn into_link_status(link: WireLink) -> LinkStatus {
    LinkStatus {
        status: Verdict::parse(&link.status),
        url: link.url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> EmailLinksResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn email_status_takes_priority_over_link_status() {
        let result = normalize_email_response(parse(
            r#"{"status":"safe","email_status":"Fraud","confidence":0.91,"links":[]}"#,
        ));
        assert_eq!(result.status, Verdict::Fraud);
        assert_eq!(result.confidence, Some(0.91));
        assert!(result.html_summary.contains("Fraud Detected"));
    }

    #[test]
    fn legitimate_email_status_maps_to_safe() {
        let result = normalize_email_response(parse(r#"{"email_status":"legitimate"}"#));
        assert_eq!(result.status, Verdict::Safe);
    }

    #[test]
    fn no_links_status_is_safe() {
        let result = normalize_email_response(parse(r#"{"status":"no_links"}"#));
        assert_eq!(result.status, Verdict::Safe);
        assert_eq!(result.message, "No links found in email");
    }

    #[test]
    fn has_phishing_without_email_status_counts_links() {
        let result = normalize_email_response(parse(
            r#"{"has_phishing":true,"link_count":3,"links":[
                {"url":"http://a.test","status":"phishing"},
                {"url":"http://b.test","status":"safe"}]}"#,
        ));
        assert_eq!(result.status, Verdict::Phishing);
        assert_eq!(result.message, "Phishing detected! 1 of 3 links are suspicious");
        assert_eq!(result.phishing_links().collect::<Vec<_>>(), vec!["http://a.test"]);
    }

    #[test]
    fn link_response_without_status_is_malformed() {
        let response: LinkResponse = serde_json::from_str(r#"{"url":"http://x.test"}"#).unwrap();
        assert!(matches!(
            normalize_link_response("http://x.test", response),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn url_batch_error_status_is_rejected() {
        let response: UrlBatchResponse =
            serde_json::from_str(r#"{"status":"error","message":"No URLs provided"}"#).unwrap();
        assert!(normalize_url_batch(response).is_err());
    }
}
