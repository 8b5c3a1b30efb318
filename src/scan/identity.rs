use sha2::{Digest, Sha256};

use crate::domain::{EmailId, ExtractedContent};

const BODY_PREFIX_CHARS: usize = 100;

/// Derives the cache key for the message currently on screen. Re-extracting
/// the same message yields the same id; all-empty input still produces an id.
pub fn derive_id(extracted: &ExtractedContent, location_fragment: &str) -> EmailId {
    let body_prefix: String = extracted.body.chars().take(BODY_PREFIX_CHARS).collect();
    let mut hasher = Sha256::new();
    for part in [
        location_fragment,
        extracted.subject.as_str(),
        extracted.sender.as_str(),
        body_prefix.as_str(),
    ] {
        // Length prefix keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    EmailId::new(hex::encode(&digest[..16]))
}

/// The part of a page URL after `#`, which webmail uses for the open view.
pub fn location_fragment(location: &str) -> &str {
    location
        .split_once('#')
        .map(|(_, fragment)| fragment)
        .unwrap_or("")
}
