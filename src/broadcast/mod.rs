mod surface;

use std::{fmt, sync::Arc};

use thiserror::Error;
use tokio::sync::{broadcast, oneshot};

use crate::domain::UiEvent;

pub use surface::{IframeSlot, LogSurface, Surface};

pub type EventBus = broadcast::Sender<Arc<UiEvent>>;
pub type ReplySlot = oneshot::Sender<Arc<UiEvent>>;

const BUS_CAPACITY: usize = 64;

pub fn event_bus() -> EventBus {
    let (sender, _) = broadcast::channel(BUS_CAPACITY);
    sender
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Reply,
    Bus,
    Iframe,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Reply => "reply",
            Channel::Bus => "bus",
            Channel::Iframe => "iframe",
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("no receiver on the {0} channel")]
    ReceiverGone(Channel),
}

/// Per-channel outcome of one broadcast. One reply entry per waiting
/// requester; `iframe` is `None` when no iframe is mounted.
#[derive(Debug)]
pub struct DeliveryReport {
    pub reply: Vec<Result<(), DeliveryError>>,
    pub bus: Result<(), DeliveryError>,
    pub iframe: Option<Result<(), DeliveryError>>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.outcomes().filter(|outcome| outcome.is_ok()).count()
    }

    fn outcomes(&self) -> impl Iterator<Item = &Result<(), DeliveryError>> {
        self.reply
            .iter()
            .chain(Some(&self.bus))
            .chain(self.iframe.as_ref())
    }
}

/// Fans one event out to every UI surface that currently exists. Each
/// channel is attempted independently and failures are swallowed.
#[derive(Clone)]
pub struct ResultBroadcaster {
    bus: EventBus,
    iframe: Option<Arc<dyn Surface>>,
}

impl ResultBroadcaster {
    pub fn new(bus: EventBus) -> Self {
        Self { bus, iframe: None }
    }

    pub fn with_iframe(mut self, iframe: Arc<dyn Surface>) -> Self {
        self.iframe = Some(iframe);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<UiEvent>> {
        self.bus.subscribe()
    }

    pub fn broadcast(&self, event: UiEvent) -> DeliveryReport {
        self.deliver(Arc::new(event), Vec::new())
    }

    /// Answers every waiting requester with the same payload the bus gets.
    pub fn reply_and_broadcast(&self, event: UiEvent, replies: Vec<ReplySlot>) -> DeliveryReport {
        self.deliver(Arc::new(event), replies)
    }

    fn deliver(&self, event: Arc<UiEvent>, replies: Vec<ReplySlot>) -> DeliveryReport {
        let reply = replies
            .into_iter()
            .map(|slot| {
                slot.send(event.clone())
                    .map_err(|_| DeliveryError::ReceiverGone(Channel::Reply))
            })
            .collect();

        let bus = self
            .bus
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| DeliveryError::ReceiverGone(Channel::Bus));

        let iframe = match &self.iframe {
            Some(surface) if surface.is_present() => Some(surface.deliver(event.clone())),
            _ => None,
        };

        let report = DeliveryReport { reply, bus, iframe };
        tracing::trace!(target: "broadcast", event = event.label(), delivered = report.delivered(), "event delivered");
        for err in report.outcomes().filter_map(|outcome| outcome.as_ref().err()) {
            tracing::debug!(target: "broadcast", event = event.label(), error = %err, "delivery skipped");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_live_channel_receives_the_same_payload() {
        let bus = event_bus();
        let mut popup = bus.subscribe();
        let (iframe, mut iframe_rx) = IframeSlot::mounted();
        let broadcaster = ResultBroadcaster::new(bus).with_iframe(Arc::new(iframe));
        let (reply_tx, mut reply_rx) = oneshot::channel();

        let report = broadcaster
            .reply_and_broadcast(UiEvent::PanelVisibility { visible: true }, vec![reply_tx]);
        assert_eq!(report.delivered(), 3);

        let from_reply = reply_rx.try_recv().unwrap();
        let from_bus = popup.try_recv().unwrap();
        let from_iframe = iframe_rx.try_recv().unwrap();
        assert!(Arc::ptr_eq(&from_reply, &from_bus));
        assert!(Arc::ptr_eq(&from_bus, &from_iframe));
    }

    #[test]
    fn missing_receivers_do_not_block_other_channels() {
        let bus = event_bus();
        let (iframe, mut iframe_rx) = IframeSlot::mounted();
        let broadcaster = ResultBroadcaster::new(bus).with_iframe(Arc::new(iframe));
        let (reply_tx, reply_rx) = oneshot::channel();
        drop(reply_rx);

        let report = broadcaster.reply_and_broadcast(UiEvent::no_email("closed"), vec![reply_tx]);
        assert_eq!(
            report.reply,
            vec![Err(DeliveryError::ReceiverGone(Channel::Reply))]
        );
        assert_eq!(report.bus, Err(DeliveryError::ReceiverGone(Channel::Bus)));
        assert_eq!(report.iframe, Some(Ok(())));
        assert!(iframe_rx.try_recv().is_ok());
    }

    #[test]
    fn absent_iframe_is_not_attempted() {
        let bus = event_bus();
        let _popup = bus.subscribe();
        let broadcaster = ResultBroadcaster::new(bus).with_iframe(Arc::new(IframeSlot::absent()));
        let report = broadcaster.broadcast(UiEvent::PhishingWarning { count: 2 });
        assert!(report.iframe.is_none());
        assert!(report.reply.is_empty());
        assert_eq!(report.delivered(), 1);
    }

    #[test]
    fn every_waiting_requester_gets_the_broadcast_payload() {
        let bus = event_bus();
        let mut popup = bus.subscribe();
        let broadcaster = ResultBroadcaster::new(bus);
        let (first_tx, mut first_rx) = oneshot::channel();
        let (second_tx, mut second_rx) = oneshot::channel();

        let report = broadcaster
            .reply_and_broadcast(UiEvent::no_email("closed"), vec![first_tx, second_tx]);
        assert_eq!(report.reply.len(), 2);
        assert_eq!(report.delivered(), 3);

        let from_bus = popup.try_recv().unwrap();
        assert!(Arc::ptr_eq(&first_rx.try_recv().unwrap(), &from_bus));
        assert!(Arc::ptr_eq(&second_rx.try_recv().unwrap(), &from_bus));
    }
}
