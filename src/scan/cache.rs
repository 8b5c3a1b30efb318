use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
};

use crate::domain::{EmailId, ScanResult};

/// Bounded result store. Eviction is by insertion order; reads do not
/// refresh an entry's position.
#[derive(Debug)]
pub struct ScanCache {
    capacity: usize,
    entries: HashMap<EmailId, Arc<ScanResult>>,
    order: VecDeque<EmailId>,
}

impl ScanCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Stores `result` under `id` and returns the id evicted to make room,
    /// if any. Overwriting an existing key keeps its original position.
    pub fn insert(&mut self, id: EmailId, result: Arc<ScanResult>) -> Option<EmailId> {
        if let Some(slot) = self.entries.get_mut(&id) {
            *slot = result;
            return None;
        }
        self.entries.insert(id.clone(), result);
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            let oldest = self.order.pop_front()?;
            self.entries.remove(&oldest);
            return Some(oldest);
        }
        None
    }

    pub fn get(&self, id: &EmailId) -> Option<Arc<ScanResult>> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &EmailId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Ids whose scan has settled and been cached at least once. Membership is
/// only ever removed by a full context reset.
#[derive(Debug, Default)]
pub struct ScannedSet {
    ids: HashSet<EmailId>,
}

impl ScannedSet {
    pub fn insert(&mut self, id: EmailId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: &EmailId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Page URLs already submitted for a link sweep.
#[derive(Debug, Default)]
pub struct UrlScanRecord {
    seen: HashSet<String>,
}

impl UrlScanRecord {
    /// Returns up to `limit` http(s) URLs not submitted before and records
    /// them as submitted.
    pub fn take_new<I>(&mut self, urls: I, limit: usize) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut fresh = Vec::new();
        for url in urls {
            if fresh.len() >= limit {
                break;
            }
            if !url.starts_with("http") || self.seen.contains(&url) {
                continue;
            }
            self.seen.insert(url.clone());
            fresh.push(url);
        }
        fresh
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Verdict;

    fn result() -> Arc<ScanResult> {
        Arc::new(ScanResult::new(Verdict::Safe, "ok", ""))
    }

    fn id(n: usize) -> EmailId {
        EmailId::new(format!("email-{n}"))
    }

    #[test]
    fn fifty_first_insert_evicts_oldest() {
        let mut cache = ScanCache::new(50);
        for n in 0..50 {
            assert_eq!(cache.insert(id(n), result()), None);
        }
        assert_eq!(cache.len(), 50);

        let evicted = cache.insert(id(50), result());
        assert_eq!(evicted, Some(id(0)));
        assert_eq!(cache.len(), 50);
        assert!(!cache.contains(&id(0)));
        assert!(cache.contains(&id(50)));
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut cache = ScanCache::new(50);
        for n in 0..500 {
            cache.insert(id(n), result());
            assert!(cache.len() <= 50);
        }
        assert!(cache.contains(&id(499)));
        assert!(cache.contains(&id(450)));
        assert!(!cache.contains(&id(449)));
    }

    #[test]
    fn reads_do_not_refresh_position() {
        let mut cache = ScanCache::new(2);
        cache.insert(id(1), result());
        cache.insert(id(2), result());
        assert!(cache.get(&id(1)).is_some());
        assert_eq!(cache.insert(id(3), result()), Some(id(1)));
    }

    #[test]
    fn overwrite_keeps_position_and_size() {
        let mut cache = ScanCache::new(2);
        cache.insert(id(1), result());
        cache.insert(id(2), result());
        let replacement = Arc::new(ScanResult::new(Verdict::Phishing, "bad", ""));
        assert_eq!(cache.insert(id(1), replacement), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&id(1)).unwrap().status, Verdict::Phishing);
        assert_eq!(cache.insert(id(3), result()), Some(id(1)));
    }

    #[test]
    fn url_record_skips_seen_and_non_http() {
        let mut record = UrlScanRecord::default();
        let first = record.take_new(
            vec![
                "https://a.test".to_string(),
                "mailto:x@y.z".to_string(),
                "http://b.test".to_string(),
            ],
            50,
        );
        assert_eq!(first, vec!["https://a.test", "http://b.test"]);

        let second = record.take_new(
            vec!["https://a.test".to_string(), "https://c.test".to_string()],
            50,
        );
        assert_eq!(second, vec!["https://c.test"]);
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn url_record_respects_limit() {
        let mut record = UrlScanRecord::default();
        let urls: Vec<String> = (0..80).map(|n| format!("https://site.test/{n}")).collect();
        assert_eq!(record.take_new(urls.clone(), 50).len(), 50);
        assert_eq!(record.take_new(urls, 50).len(), 30);
    }
}
