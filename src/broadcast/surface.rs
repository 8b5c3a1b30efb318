use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::UiEvent;

use super::{Channel, DeliveryError};

/// A UI target that may or may not exist at delivery time.
pub trait Surface: Send + Sync {
    fn is_present(&self) -> bool {
        true
    }

    fn deliver(&self, event: Arc<UiEvent>) -> Result<(), DeliveryError>;
}

/// The embedded results iframe. Mounting hands back the receiving end;
/// dropping that receiver makes the slot absent again.
#[derive(Default)]
pub struct IframeSlot {
    sender: Mutex<Option<mpsc::UnboundedSender<Arc<UiEvent>>>>,
}

impl IframeSlot {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn mounted() -> (Self, mpsc::UnboundedReceiver<Arc<UiEvent>>) {
        let slot = Self::absent();
        let receiver = slot.mount();
        (slot, receiver)
    }

    pub fn mount(&self) -> mpsc::UnboundedReceiver<Arc<UiEvent>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.sender.lock() = Some(sender);
        receiver
    }
}

impl Surface for IframeSlot {
    fn is_present(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    fn deliver(&self, event: Arc<UiEvent>) -> Result<(), DeliveryError> {
        let guard = self.sender.lock();
        let sender = guard
            .as_ref()
            .ok_or(DeliveryError::ReceiverGone(Channel::Iframe))?;
        sender
            .send(event)
            .map_err(|_| DeliveryError::ReceiverGone(Channel::Iframe))
    }
}

/// Headless stand-in for the popup and floating panel: writes every event
/// it sees to the log.
pub struct LogSurface;

impl Surface for LogSurface {
    fn deliver(&self, event: Arc<UiEvent>) -> Result<(), DeliveryError> {
        match event.as_ref() {
            UiEvent::EmailResult {
                email_id,
                result,
                cached,
            } => tracing::info!(
                target: "panel",
                email_id = %email_id,
                status = %result.status,
                origin = ?result.origin,
                confidence = ?result.confidence,
                cached,
                "{}",
                result.message
            ),
            UiEvent::Scanning { subject, sender, .. } => {
                tracing::info!(target: "panel", subject = %subject, sender = %sender, "scanning email")
            }
            UiEvent::NoEmail { reason, .. } => {
                tracing::info!(target: "panel", reason = %reason, "no email")
            }
            UiEvent::LinkUpdate(update) => tracing::info!(
                target: "panel",
                url = %update.url,
                status = %update.status,
                analysis = ?update.analysis_type,
                confidence = update.confidence,
                "{}",
                update.details
            ),
            UiEvent::DangerousLinks { urls } => {
                tracing::warn!(target: "panel", count = urls.len(), ?urls, "dangerous links highlighted")
            }
            UiEvent::PhishingWarning { count } => tracing::warn!(
                target: "panel",
                count,
                "Found {count} potential phishing links on this page"
            ),
            UiEvent::PanelVisibility { visible } => {
                tracing::info!(target: "panel", visible, "panel visibility changed")
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_receiver_makes_slot_absent() {
        let (slot, receiver) = IframeSlot::mounted();
        assert!(slot.is_present());
        drop(receiver);
        assert!(!slot.is_present());
    }

    #[test]
    fn absent_slot_rejects_delivery() {
        let slot = IframeSlot::absent();
        assert!(!slot.is_present());
        assert_eq!(
            slot.deliver(Arc::new(UiEvent::PanelVisibility { visible: false })),
            Err(DeliveryError::ReceiverGone(Channel::Iframe))
        );
    }
}
