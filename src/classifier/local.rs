//! Keyword heuristics used when the classification service cannot answer.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::Verdict;

const URL_KEYWORDS: [&str; 10] = [
    "login", "verify", "account", "secure", "bank", "paypal", "password", "signin", "update",
    "confirm",
];

const PHISHING_TERMS: [&str; 6] = ["verify", "account", "login", "password", "click", "confirm"];
const FRAUD_TERMS: [&str; 7] = [
    "money",
    "bank",
    "transfer",
    "urgently",
    "wire",
    "western union",
    "transaction",
];
const SPAM_TERMS: [&str; 8] = [
    "offer",
    "free",
    "discount",
    "save",
    "limited time",
    "deal",
    "buy",
    "sale",
];
const MALWARE_TERMS: [&str; 7] = [
    "attachment",
    "download",
    "exe",
    "zip",
    "file",
    "invoice",
    "document",
];
const URGENT_TERMS: [&str; 6] = [
    "urgent",
    "immediate",
    "attention required",
    "alert",
    "important",
    "immediately",
];
const SHORTENERS: [&str; 3] = ["bit.ly", "goo.gl", "tinyurl"];

static SENSITIVE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)password|login credentials|username|account verification")
        .expect("valid sensitive-info regex")
});
static FINANCIAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)bank account|send money|transfer funds|payment|inheritance")
        .expect("valid financial regex")
});
static MARKETING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)unsubscribe|opt[ -]?out|marketing|newsletter|buy now|special offer")
        .expect("valid marketing regex")
});
static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("valid url regex"));

/// Phishing if the lower-cased URL contains any credential-bait keyword.
pub fn classify_url(url: &str) -> Verdict {
    let lowered = url.to_lowercase();
    if URL_KEYWORDS.iter().any(|term| lowered.contains(term)) {
        Verdict::Phishing
    } else {
        Verdict::Safe
    }
}

/// Approximate confidence reported alongside a local-only link verdict.
pub fn url_confidence(verdict: Verdict) -> f32 {
    if verdict == Verdict::Phishing {
        0.7
    } else {
        0.3
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailAssessment {
    pub verdict: Verdict,
    pub score: u32,
    pub confidence: f32,
    pub features: Vec<&'static str>,
}

/// Scores subject and body against four term families and reports the
/// strongest one. A top score below 2 counts as safe.
pub fn assess_email(subject: &str, body: &str) -> EmailAssessment {
    let content = body.to_lowercase();
    let subject = subject.to_lowercase();
    let mentions = |term: &str| content.contains(term) || subject.contains(term);
    let count = |terms: &[&str]| terms.iter().filter(|term| mentions(term)).count() as u32;

    let mut features = Vec::new();
    let mut phishing = count(&PHISHING_TERMS);
    let mut fraud = count(&FRAUD_TERMS);
    let mut spam = count(&SPAM_TERMS);
    let malware = count(&MALWARE_TERMS);

    if SENSITIVE_REGEX.is_match(&content) {
        phishing += 2;
        features.push("Requests sensitive information");
    }
    if FINANCIAL_REGEX.is_match(&content) {
        fraud += 2;
        features.push("Solicits financial transaction");
    }
    if MARKETING_REGEX.is_match(&content) {
        spam += 1;
        features.push("Marketing/promotional content");
    }
    if URL_REGEX
        .find_iter(body)
        .any(|m| SHORTENERS.iter().any(|s| m.as_str().contains(s)))
    {
        phishing += 1;
        features.push("Contains shortened URLs");
    }
    if URGENT_TERMS.iter().any(|term| subject.contains(term)) {
        phishing += 1;
        fraud += 1;
        features.push("Urgent language in subject");
    }

    // Ties resolve in declaration order.
    let ranked = [
        (Verdict::Phishing, phishing),
        (Verdict::Fraud, fraud),
        (Verdict::Spam, spam),
        (Verdict::Malware, malware),
    ];
    let (verdict, score) = ranked
        .iter()
        .copied()
        .fold((Verdict::Phishing, 0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });

    if score < 2 {
        return EmailAssessment {
            verdict: Verdict::Safe,
            score,
            confidence: 0.8,
            features: vec!["No suspicious patterns detected"],
        };
    }

    features.truncate(3);
    EmailAssessment {
        verdict,
        score,
        confidence: (score as f32 / 5.0).min(0.95),
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_keywords_are_case_insensitive() {
        assert_eq!(classify_url("https://PayPal.example.com/"), Verdict::Phishing);
        assert_eq!(classify_url("http://bit.ly/xyz"), Verdict::Safe);
    }

    #[test]
    fn url_confidence_tracks_verdict() {
        assert_eq!(url_confidence(Verdict::Phishing), 0.7);
        assert_eq!(url_confidence(Verdict::Safe), 0.3);
    }

    #[test]
    fn quiet_email_is_safe() {
        let assessment = assess_email("Lunch tomorrow?", "Want to grab lunch at noon?");
        assert_eq!(assessment.verdict, Verdict::Safe);
        assert_eq!(assessment.confidence, 0.8);
    }

    #[test]
    fn credential_request_scores_as_phishing() {
        let assessment = assess_email(
            "Urgent: verify your account",
            "Click here to confirm your password at http://bit.ly/abc",
        );
        assert_eq!(assessment.verdict, Verdict::Phishing);
        assert!(assessment.score >= 5);
        assert_eq!(assessment.confidence, 0.95);
        assert!(assessment.features.len() <= 3);
    }

    #[test]
    fn lottery_mail_scores_as_fraud() {
        let assessment = assess_email(
            "Winner notice",
            "Send money by wire transfer to your bank account to receive the inheritance",
        );
        assert_eq!(assessment.verdict, Verdict::Fraud);
    }
}
