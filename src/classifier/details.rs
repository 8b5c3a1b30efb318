use crate::domain::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::High => "high",
            ThreatLevel::Medium => "medium",
            ThreatLevel::Low => "low",
            ThreatLevel::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatDetails {
    pub title: String,
    pub description: String,
    pub recommendation: String,
    pub level: ThreatLevel,
}

impl ThreatDetails {
    pub fn for_verdict(verdict: Verdict) -> Self {
        let (title, description, recommendation, level) = match verdict {
            Verdict::Phishing => (
                "Phishing Detected",
                "This email appears to be a phishing attempt trying to steal your personal information.",
                "Do not click any links or reply with personal information.",
                ThreatLevel::High,
            ),
            Verdict::Fraud => (
                "Fraud Detected",
                "This email appears to be a fraudulent message attempting financial deception.",
                "Do not respond or send any money or personal information.",
                ThreatLevel::High,
            ),
            Verdict::Malware => (
                "Potential Malware",
                "This email may contain malicious attachments or links to harmful software.",
                "Do not download attachments or click suspicious links.",
                ThreatLevel::High,
            ),
            Verdict::Spam => (
                "Spam Email",
                "This appears to be unsolicited bulk email or marketing.",
                "Consider marking as spam or unsubscribing if from a legitimate source.",
                ThreatLevel::Medium,
            ),
            Verdict::Safe => (
                "Legitimate Email",
                "Email content appears legitimate and safe.",
                "No action needed.",
                ThreatLevel::Low,
            ),
            Verdict::Error => (
                "Scan Failed",
                "The email could not be analyzed.",
                "Check your connection or try again later.",
                ThreatLevel::Unknown,
            ),
            Verdict::Unknown => (
                "Analysis Complete",
                "Email analysis complete.",
                "Use caution with unfamiliar emails.",
                ThreatLevel::Unknown,
            ),
        };
        Self {
            title: title.into(),
            description: description.into(),
            recommendation: recommendation.into(),
            level,
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            "<b>{}</b><br>{}<br><i>{}</i>",
            escape_html(&self.title),
            escape_html(&self.description),
            escape_html(&self.recommendation)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence > 0.8 {
            RiskTier::High
        } else if confidence > 0.5 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Human-readable explanation attached to a remote link verdict. Phishing
/// and safe verdicts share the tiering and differ only in wording.
pub fn link_details(
    verdict: Verdict,
    confidence: f32,
    suspicious_keywords: bool,
    url_length: Option<usize>,
) -> String {
    let tier = RiskTier::from_confidence(confidence);
    if verdict == Verdict::Phishing {
        let mut details = String::from("Warning: This URL shows signs of a phishing threat.");
        if suspicious_keywords {
            details.push_str("\n• Contains keywords often used in phishing.");
        }
        if url_length.is_some_and(|len| len > 75) {
            details.push_str("\n• The URL is unusually long, a common phishing tactic.");
        }
        details.push_str(match tier {
            RiskTier::High => "\n\nRecommendation: HIGH RISK! Avoid this website.",
            RiskTier::Medium => "\n\nRecommendation: MEDIUM RISK. Exercise extreme caution.",
            RiskTier::Low => "\n\nRecommendation: LOW RISK, but be careful.",
        });
        details
    } else {
        let mut details = String::from("This URL appears to be safe.");
        details.push_str(match tier {
            RiskTier::High => "\n\nAssessment: HIGH confidence in this verdict.",
            RiskTier::Medium => "\n\nAssessment: MEDIUM confidence in this verdict.",
            RiskTier::Low => "\n\nAssessment: LOW confidence, stay alert.",
        });
        if suspicious_keywords {
            details.push_str("\n\nNote: While the structure seems safe, it contains some suspicious keywords. Please exercise caution.");
        }
        details
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
