use url::Url;

const SIMPLIFY_ABOVE: usize = 100;
const HARD_LIMIT: usize = 500;

/// Prepares a link for the classifier. Control characters are stripped;
/// long parseable URLs are reduced to origin plus path, and unparseable
/// ones are still scanned after truncation.
pub fn prepare_for_scan(raw: &str) -> String {
    let cleaned: String = raw.trim().chars().filter(|ch| !ch.is_control()).collect();

    match Url::parse(&cleaned) {
        Ok(parsed) if cleaned.len() > SIMPLIFY_ABOVE => {
            let origin = parsed.origin();
            if origin.is_tuple() {
                format!("{}{}", origin.ascii_serialization(), parsed.path())
            } else {
                truncate_chars(cleaned, HARD_LIMIT)
            }
        }
        Ok(_) => cleaned,
        Err(_) => truncate_chars(cleaned, HARD_LIMIT),
    }
}

fn truncate_chars(value: String, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value,
    }
}
