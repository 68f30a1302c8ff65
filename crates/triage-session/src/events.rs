//! Observable session events.
//!
//! The controller publishes one event per visible change so a view can render
//! incrementally instead of diffing the whole session.

use tokio::sync::mpsc;
use uuid::Uuid;

use triage_core::types::{Mode, Origin};

use crate::state::SessionState;

/// A change the view should reflect.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    ModeChanged {
        mode: Mode,
    },
    /// A message was appended to the log. Assistant messages start empty.
    MessageAppended {
        id: Uuid,
        origin: Origin,
        text: String,
    },
    /// The trailing assistant message grew by text.
    MessageGrew {
        id: Uuid,
        text: String,
        revealed: usize,
        total: usize,
    },
    RevealCompleted {
        id: Uuid,
    },
    /// A diagnosis was revealed; offer the diet plan for this condition.
    DietOfferShown {
        condition: String,
    },
    InputChanged {
        text: String,
    },
    AttachmentChanged {
        file_name: Option<String>,
    },
    CaptureStarted,
    CaptureFinished {
        transcript: Option<String>,
    },
    BannerRaised {
        message: String,
    },
    BannerCleared,
}

/// Optional event sink. Sends never block and are dropped once the receiver
/// is gone.
#[derive(Debug, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    pub(crate) fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("Event receiver dropped, unsubscribing");
                self.tx = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscriber_is_noop() {
        let mut sink = EventSink::default();
        sink.emit(SessionEvent::BannerCleared);
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let mut sink = EventSink::default();
        let mut rx = sink.subscribe();
        sink.emit(SessionEvent::CaptureStarted);
        sink.emit(SessionEvent::ModeChanged { mode: Mode::Diet });

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::CaptureStarted);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::ModeChanged { mode: Mode::Diet }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_unsubscribes() {
        let mut sink = EventSink::default();
        drop(sink.subscribe());
        sink.emit(SessionEvent::BannerCleared);
        assert!(sink.tx.is_none());
    }
}
