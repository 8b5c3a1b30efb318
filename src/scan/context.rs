use serde::Serialize;

use crate::domain::EmailId;

use super::cache::{ScanCache, ScannedSet, UrlScanRecord};

/// Scan state for one page session. Owned by that session's coordinator and
/// never shared.
#[derive(Debug)]
pub struct ScanContext {
    pub cache: ScanCache,
    pub scanned: ScannedSet,
    pub pending: Option<EmailId>,
    pub urls: UrlScanRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    pub cached: usize,
    pub capacity: usize,
    pub scanned: usize,
    pub submitted_urls: usize,
    pub pending: Option<EmailId>,
}

impl ScanContext {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: ScanCache::new(cache_capacity),
            scanned: ScannedSet::default(),
            pending: None,
            urls: UrlScanRecord::default(),
        }
    }

    /// Forgets everything. Used when the tab leaves webmail entirely.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.scanned.clear();
        self.pending = None;
        self.urls.clear();
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            cached: self.cache.len(),
            capacity: self.cache.capacity(),
            scanned: self.scanned.len(),
            submitted_urls: self.urls.len(),
            pending: self.pending.clone(),
        }
    }
}
