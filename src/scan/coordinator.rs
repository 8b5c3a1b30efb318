use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::{
    broadcast::{ReplySlot, ResultBroadcaster},
    domain::{EmailId, ExtractedContent, ScanResult, UiEvent},
};

use super::{
    context::{ContextSnapshot, ScanContext},
    identity::{derive_id, location_fragment},
    EmailScanRequest, PageSource, ScanDispatcher,
};

const MAIL_HOSTS: [&str; 5] = [
    "mail.google.com",
    "outlook.live.com",
    "outlook.office.com",
    "outlook.office365.com",
    "mail.yahoo.com",
];
const GMAIL_VIEW_PREFIXES: [&str; 4] = ["inbox/", "search/", "sent/", "drafts/"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    EmailOpenUnscanned(EmailId),
    ScanInFlight(EmailId),
    EmailOpenResolved(EmailId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Poll,
    PossibleChange,
    UrlChanged,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Disabled,
    Idle,
    Unchanged(EmailId),
    Replayed(EmailId),
    Suppressed(EmailId),
    PreviouslyScanned(EmailId),
    Dispatched(EmailId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    EmailView,
    Mailbox,
    Elsewhere,
}

/// Classifies a page location: an open message in a known webmail client,
/// some other webmail view, or a page outside webmail.
pub fn classify_location(location: &str) -> ViewKind {
    let Ok(parsed) = Url::parse(location) else {
        return ViewKind::Elsewhere;
    };
    let Some(host) = parsed.host_str() else {
        return ViewKind::Elsewhere;
    };
    if !MAIL_HOSTS.contains(&host) {
        return ViewKind::Elsewhere;
    }

    let fragment = parsed.fragment().unwrap_or("");
    let gmail_message = GMAIL_VIEW_PREFIXES
        .iter()
        .any(|prefix| fragment.strip_prefix(prefix).is_some_and(|rest| !rest.is_empty()));
    let outlook_message = parsed.path().contains("/id/");
    if gmail_message || outlook_message {
        ViewKind::EmailView
    } else {
        ViewKind::Mailbox
    }
}

/// Decides on every trigger whether to scan the open email, replay a cached
/// verdict, or do nothing. One instance per page session.
pub struct ScanCoordinator {
    context: ScanContext,
    state: CoordinatorState,
    broadcaster: ResultBroadcaster,
    dispatcher: Arc<dyn ScanDispatcher>,
    auto_scan: bool,
    url_batch_limit: usize,
    generation: u64,
    waiting: Vec<Waiter>,
}

/// A manual requester waiting for the verdict of one specific email.
struct Waiter {
    email_id: EmailId,
    slot: ReplySlot,
}

impl ScanCoordinator {
    pub fn new(
        cache_capacity: usize,
        url_batch_limit: usize,
        broadcaster: ResultBroadcaster,
        dispatcher: Arc<dyn ScanDispatcher>,
    ) -> Self {
        Self {
            context: ScanContext::new(cache_capacity),
            state: CoordinatorState::Idle,
            broadcaster,
            dispatcher,
            auto_scan: true,
            url_batch_limit,
            generation: 0,
            waiting: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        self.context.snapshot()
    }

    pub fn set_auto_scan(&mut self, enabled: bool) {
        if self.auto_scan != enabled {
            tracing::info!(target: "coordinator", enabled, "auto-scan toggled");
        }
        self.auto_scan = enabled;
    }

    /// Like [`tick`](Self::tick), but `reply` receives the verdict for the
    /// email open right now, or the "no email" status when none is open.
    pub fn tick_with_reply(
        &mut self,
        trigger: Trigger,
        page: &dyn PageSource,
        reply: ReplySlot,
    ) -> TickOutcome {
        self.evaluate(trigger, page, Some(reply))
    }

    pub fn tick(&mut self, trigger: Trigger, page: &dyn PageSource) -> TickOutcome {
        self.evaluate(trigger, page, None)
    }

    fn evaluate(
        &mut self,
        trigger: Trigger,
        page: &dyn PageSource,
        reply: Option<ReplySlot>,
    ) -> TickOutcome {
        let on_demand = trigger == Trigger::Manual || reply.is_some();
        if !on_demand && !self.auto_scan {
            return TickOutcome::Disabled;
        }

        let content = match page.extract() {
            Ok(Some(content)) if content.is_scannable() => content,
            Ok(_) => {
                self.close_answering("No email content detected in current view", reply);
                return TickOutcome::Idle;
            }
            Err(err) => {
                tracing::warn!(target: "coordinator", error = %err, "email extraction failed");
                self.close_answering("No email content detected in current view", reply);
                return TickOutcome::Idle;
            }
        };

        let location = page.location();
        let id = derive_id(&content, location_fragment(&location));
        if let Some(slot) = reply {
            self.waiting.push(Waiter {
                email_id: id.clone(),
                slot,
            });
        }

        if !on_demand && self.state == CoordinatorState::EmailOpenResolved(id.clone()) {
            return TickOutcome::Unchanged(id);
        }
        if self.state != CoordinatorState::ScanInFlight(id.clone()) {
            self.state = CoordinatorState::EmailOpenUnscanned(id.clone());
        }

        if let Some(cached) = self.context.cache.get(&id) {
            tracing::debug!(target: "coordinator", email_id = %id, "replaying cached result");
            self.context.pending = Some(id.clone());
            self.state = CoordinatorState::EmailOpenResolved(id.clone());
            self.announce_result(id.clone(), cached, true);
            return TickOutcome::Replayed(id);
        }

        if self.context.pending.as_ref() == Some(&id)
            && self.state == CoordinatorState::ScanInFlight(id.clone())
        {
            return TickOutcome::Suppressed(id);
        }
        self.context.pending = Some(id.clone());

        if self.context.scanned.contains(&id) {
            tracing::debug!(
                target: "coordinator",
                email_id = %id,
                "scanned before but evicted from cache"
            );
            let placeholder = Arc::new(ScanResult::previously_scanned(content.display_subject()));
            self.state = CoordinatorState::EmailOpenResolved(id.clone());
            self.announce_result(id.clone(), placeholder, true);
            return TickOutcome::PreviouslyScanned(id);
        }

        self.begin_scan(id.clone(), content, trigger == Trigger::Manual);
        TickOutcome::Dispatched(id)
    }

    fn begin_scan(&mut self, id: EmailId, content: ExtractedContent, manual: bool) {
        tracing::info!(
            target: "coordinator",
            email_id = %id,
            subject = %content.display_subject(),
            body_length = content.body.len(),
            manual,
            "new email opened; dispatching scan"
        );
        self.state = CoordinatorState::ScanInFlight(id.clone());
        self.broadcaster.broadcast(UiEvent::Scanning {
            email_id: id.clone(),
            subject: content.display_subject().to_string(),
            sender: content.sender.clone(),
            body_length: content.body.len(),
            at: Utc::now(),
        });
        self.dispatcher.dispatch(EmailScanRequest {
            email_id: id,
            content,
            manual,
            generation: self.generation,
        });
    }

    /// Records a settled scan. The cache write and ScannedSet insert happen
    /// before the broadcast so a concurrent tick never sees a result that
    /// was announced but not stored.
    pub fn settle(&mut self, id: EmailId, generation: u64, result: ScanResult) {
        if generation != self.generation {
            tracing::debug!(
                target: "coordinator",
                email_id = %id,
                generation,
                current = self.generation,
                "dropping result from a reset context"
            );
            return;
        }

        let result = Arc::new(result);
        if let Some(evicted) = self.context.cache.insert(id.clone(), result.clone()) {
            tracing::debug!(target: "coordinator", email_id = %evicted, "evicted oldest cached result");
        }
        self.context.scanned.insert(id.clone());

        if self.state == CoordinatorState::ScanInFlight(id.clone()) {
            self.state = CoordinatorState::EmailOpenResolved(id.clone());
        }

        tracing::info!(
            target: "coordinator",
            email_id = %id,
            status = %result.status,
            cached = self.context.cache.len(),
            "scan settled"
        );
        self.announce_result(id, result, false);
    }

    /// `* -> IDLE`. Cache and ScannedSet survive so reopening an email
    /// replays its verdict.
    pub fn close(&mut self, reason: &str) {
        self.close_answering(reason, None);
    }

    /// Every waiting requester learns that no email is open, whichever
    /// email it asked about.
    fn close_answering(&mut self, reason: &str, extra: Option<ReplySlot>) {
        self.context.pending = None;
        let slots: Vec<ReplySlot> = self
            .waiting
            .drain(..)
            .map(|waiter| waiter.slot)
            .chain(extra)
            .collect();
        if self.state == CoordinatorState::Idle {
            answer_quietly(slots, UiEvent::no_email(reason));
            return;
        }
        tracing::debug!(target: "coordinator", reason, "email closed");
        self.state = CoordinatorState::Idle;
        self.broadcaster.reply_and_broadcast(UiEvent::no_email(reason), slots);
    }

    /// Broadcasts a verdict and answers only the requesters that asked
    /// about this email.
    fn announce_result(&mut self, id: EmailId, result: Arc<ScanResult>, cached: bool) {
        let (matched, rest): (Vec<Waiter>, Vec<Waiter>) = std::mem::take(&mut self.waiting)
            .into_iter()
            .partition(|waiter| waiter.email_id == id);
        self.waiting = rest;
        let slots = matched.into_iter().map(|waiter| waiter.slot).collect();
        self.broadcaster.reply_and_broadcast(
            UiEvent::EmailResult {
                email_id: id,
                result,
                cached,
            },
            slots,
        );
    }

    /// Drops all session state, e.g. when the tab leaves webmail.
    pub fn reset(&mut self) {
        self.close("Navigated away from email");
        self.clear();
    }

    /// Empties the cache, ScannedSet and URL record without announcing
    /// anything on the bus. Scans still in flight settle into the void, so
    /// their waiters are answered with "no email" here.
    pub fn clear(&mut self) {
        let slots = self.waiting.drain(..).map(|waiter| waiter.slot).collect();
        answer_quietly(slots, UiEvent::no_email("Scan cache cleared"));
        self.context.reset();
        self.state = CoordinatorState::Idle;
        self.generation += 1;
        tracing::info!(target: "coordinator", generation = self.generation, "scan context cleared");
    }

    /// Reacts to a location change. An opened message is evaluated straight
    /// away; other webmail views close the email; leaving webmail resets.
    pub fn navigate(&mut self, page: &dyn PageSource) -> Option<TickOutcome> {
        let location = page.location();
        match classify_location(&location) {
            ViewKind::EmailView => Some(self.tick(Trigger::UrlChanged, page)),
            ViewKind::Mailbox => {
                self.close("Navigated away from email");
                None
            }
            ViewKind::Elsewhere => {
                self.reset();
                None
            }
        }
    }

    /// Picks page links that have not been submitted for a sweep yet.
    pub fn collect_new_links(&mut self, page: &dyn PageSource) -> Vec<String> {
        if !self.auto_scan {
            return Vec::new();
        }
        self.context.urls.take_new(page.links(), self.url_batch_limit)
    }
}

/// Answers requesters directly, without touching the bus.
fn answer_quietly(slots: Vec<ReplySlot>, event: UiEvent) {
    if slots.is_empty() {
        return;
    }
    let event = Arc::new(event);
    for slot in slots {
        let _ = slot.send(event.clone());
    }
}
