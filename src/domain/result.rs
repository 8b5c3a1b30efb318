use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Safe,
    Phishing,
    Spam,
    Fraud,
    Malware,
    Error,
    Unknown,
}

impl Verdict {
    /// Maps a wire label onto a verdict. The service reports `legitimate`
    /// for clean mail in some responses.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "safe" | "legitimate" => Verdict::Safe,
            "phishing" => Verdict::Phishing,
            "spam" => Verdict::Spam,
            "fraud" => Verdict::Fraud,
            "malware" => Verdict::Malware,
            "error" => Verdict::Error,
            _ => Verdict::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Safe => "safe",
            Verdict::Phishing => "phishing",
            Verdict::Spam => "spam",
            Verdict::Fraud => "fraud",
            Verdict::Malware => "malware",
            Verdict::Error => "error",
            Verdict::Unknown => "unknown",
        }
    }

    pub fn is_threat(&self) -> bool {
        matches!(
            self,
            Verdict::Phishing | Verdict::Spam | Verdict::Fraud | Verdict::Malware
        )
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a result came from. Anything other than `Remote` must be rendered
/// differently from a confident verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    Remote,
    LocalFallback,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub url: String,
    pub status: Verdict,
}

/// Immutable verdict record for one settled scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub status: Verdict,
    pub message: String,
    pub html_summary: String,
    pub confidence: Option<f32>,
    pub produced_at: DateTime<Utc>,
    pub links: Vec<LinkStatus>,
    pub origin: ResultOrigin,
    /// Keyword assessment attached when the remote scan failed.
    pub local_hint: Option<Verdict>,
}

impl ScanResult {
    pub fn new(status: Verdict, message: impl Into<String>, html_summary: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            html_summary: html_summary.into(),
            confidence: None,
            produced_at: Utc::now(),
            links: Vec::new(),
            origin: ResultOrigin::Remote,
            local_hint: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = if confidence.is_finite() {
            Some(confidence.clamp(0.0, 1.0))
        } else {
            None
        };
        self
    }

    pub fn with_links(mut self, links: Vec<LinkStatus>) -> Self {
        self.links = links;
        self
    }

    pub fn with_origin(mut self, origin: ResultOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_local_hint(mut self, hint: Verdict) -> Self {
        self.local_hint = Some(hint);
        self
    }

    /// Placeholder for an email that settled earlier but whose cache entry
    /// has since been evicted.
    pub fn previously_scanned(subject: &str) -> Self {
        Self::new(
            Verdict::Safe,
            format!("Previously scanned: \"{subject}\""),
            "<b>PREVIOUSLY SCANNED</b><br>This email was analyzed before; the detailed result is no longer available.",
        )
        .with_origin(ResultOrigin::Stale)
    }

    pub fn is_confident(&self) -> bool {
        self.origin == ResultOrigin::Remote && self.status != Verdict::Error
    }

    pub fn phishing_links(&self) -> impl Iterator<Item = &str> {
        self.links
            .iter()
            .filter(|link| link.status == Verdict::Phishing)
            .map(|link| link.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_maps_legitimate_to_safe() {
        assert_eq!(Verdict::parse("Legitimate"), Verdict::Safe);
        assert_eq!(Verdict::parse(" PHISHING "), Verdict::Phishing);
        assert_eq!(Verdict::parse("suspicious"), Verdict::Unknown);
    }

    #[test]
    fn confidence_is_clamped() {
        let result = ScanResult::new(Verdict::Spam, "m", "h").with_confidence(1.7);
        assert_eq!(result.confidence, Some(1.0));
        let result = ScanResult::new(Verdict::Spam, "m", "h").with_confidence(f32::NAN);
        assert_eq!(result.confidence, None);
    }

    #[test]
    fn stale_placeholder_is_not_confident() {
        let result = ScanResult::previously_scanned("Invoice");
        assert_eq!(result.status, Verdict::Safe);
        assert_eq!(result.origin, ResultOrigin::Stale);
        assert!(!result.is_confident());
    }
}
