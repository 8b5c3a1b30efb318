mod cache;
mod context;
pub mod coordinator;
pub mod identity;
pub mod race;
pub mod sanitize;

use crate::domain::{EmailId, ExtractedContent};

pub use cache::{ScanCache, ScannedSet, UrlScanRecord};
pub use context::{ContextSnapshot, ScanContext};
pub use coordinator::{CoordinatorState, ScanCoordinator, TickOutcome, Trigger};
pub use race::{LinkRace, LinkScanTicket};

/// The page being watched. Extraction is allowed to fail; the coordinator
/// treats failures the same as "no email open".
pub trait PageSource: Send + Sync {
    fn extract(&self) -> anyhow::Result<Option<ExtractedContent>>;
    fn location(&self) -> String;
    fn links(&self) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub struct EmailScanRequest {
    pub email_id: EmailId,
    pub content: ExtractedContent,
    pub manual: bool,
    /// Context generation the request was issued in; results from an older
    /// generation are discarded on settle.
    pub generation: u64,
}

/// Hands an email scan to the classification side without waiting for it.
/// The outcome comes back through [`ScanCoordinator::settle`].
pub trait ScanDispatcher: Send + Sync {
    fn dispatch(&self, request: EmailScanRequest);
}
