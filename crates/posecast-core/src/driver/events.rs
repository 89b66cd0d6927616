//! Messages delivered to the frame driver between ticks

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::Result;
use crate::xr::{AnchorId, InputSource};

/// Something that happened outside a tick, applied at the start of the next one
#[derive(Debug)]
pub enum DriverEvent {
    /// Press of a drag gesture; carries the input source as seen at event time
    GestureStart(InputSource),
    /// Release of the current drag gesture
    GestureEnd,
    /// Placement request from an input source
    Select(InputSource),
    /// Completion of an anchor creation request
    AnchorCreated(Result<AnchorId>),
    /// Host asked for the session to end
    EndSession,
}

impl DriverEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverEvent::GestureStart(_) => "gesture_start",
            DriverEvent::GestureEnd => "gesture_end",
            DriverEvent::Select(_) => "select",
            DriverEvent::AnchorCreated(_) => "anchor_created",
            DriverEvent::EndSession => "end_session",
        }
    }
}

/// Create the driver's event queue
pub fn channel() -> (EventSender, UnboundedReceiver<DriverEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}

/// Cloneable handle for posting events to a running driver.
///
/// Every method returns `false` once the driver has been dropped.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: UnboundedSender<DriverEvent>,
}

impl EventSender {
    pub fn send(&self, event: DriverEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn gesture_start(&self, input: InputSource) -> bool {
        self.send(DriverEvent::GestureStart(input))
    }

    pub fn gesture_end(&self) -> bool {
        self.send(DriverEvent::GestureEnd)
    }

    pub fn select(&self, input: InputSource) -> bool {
        self.send(DriverEvent::Select(input))
    }

    pub fn end_session(&self) -> bool {
        self.send(DriverEvent::EndSession)
    }

    /// Post an anchor creation result. Hands the anchor back when the driver
    /// can no longer take it, so the caller can release the handle.
    pub(crate) fn anchor_created(&self, result: Result<AnchorId>) -> Option<AnchorId> {
        match self.tx.send(DriverEvent::AnchorCreated(result)) {
            Err(SendError(DriverEvent::AnchorCreated(Ok(anchor)))) => Some(anchor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xr::TargetRayMode;

    #[test]
    fn test_events_arrive_in_order() {
        let (sender, mut rx) = channel();
        let input = InputSource::new(3, TargetRayMode::TrackedPointer);

        assert!(sender.gesture_start(input.clone()));
        assert!(sender.gesture_end());
        assert!(sender.select(input));
        assert_eq!(sender.anchor_created(Ok(AnchorId(1))), None);

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.as_str())
            .collect();
        assert_eq!(kinds, vec!["gesture_start", "gesture_end", "select", "anchor_created"]);
    }

    #[test]
    fn test_send_after_driver_dropped() {
        let (sender, rx) = channel();
        drop(rx);
        assert!(!sender.end_session());
    }

    #[test]
    fn test_undelivered_anchor_is_handed_back() {
        let (sender, mut rx) = channel();
        rx.close();
        assert_eq!(sender.anchor_created(Ok(AnchorId(7))), Some(AnchorId(7)));
        assert_eq!(
            sender.anchor_created(Err(crate::error::Error::AnchorCreationFailed("x".into()))),
            None
        );
    }
}
