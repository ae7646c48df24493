//! Destinations for human-readable progress lines emitted by long operations.

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::sse::ProgressEvent,
    state::ProgressHub,
};

/// SSE event name of progress lines.
pub const EVENT_PROGRESS: &str = "progress";

/// Receives progress notifications. Delivery is best effort and must never block.
pub trait ProgressSink: Send + Sync {
    /// Deliver one line.
    fn notify(&self, message: &str);
}

/// Bounded channel sink; messages are dropped when the receiver lags behind.
impl ProgressSink for mpsc::Sender<String> {
    fn notify(&self, message: &str) {
        let _ = self.try_send(message.to_string());
    }
}

/// Writes progress lines to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn notify(&self, message: &str) {
        info!(progress = message, "operation progress");
    }
}

/// Fans progress out to SSE subscribers.
#[derive(Clone)]
pub struct SseProgress {
    hub: ProgressHub,
    operation_id: Option<Uuid>,
}

impl SseProgress {
    /// Sink tagging lines with `operation_id`.
    pub fn new(hub: ProgressHub, operation_id: Option<Uuid>) -> Self {
        Self { hub, operation_id }
    }
}

impl ProgressSink for SseProgress {
    fn notify(&self, message: &str) {
        let payload = ProgressEvent {
            operation_id: self.operation_id,
            message: message.to_string(),
        };
        self.hub.publish(EVENT_PROGRESS, &payload);
    }
}

/// Forwards every message to two sinks.
pub struct Tee<'a>(pub &'a dyn ProgressSink, pub &'a dyn ProgressSink);

impl ProgressSink for Tee<'_> {
    fn notify(&self, message: &str) {
        self.0.notify(message);
        self.1.notify(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_drops_when_full() {
        let (tx, mut rx) = mpsc::channel::<String>(1);
        tx.notify("first");
        tx.notify("second");

        assert_eq!(rx.try_recv().unwrap(), "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sse_sink_publishes_json_payload() {
        let hub = ProgressHub::new(4);
        let mut receiver = hub.subscribe();
        let id = Uuid::new_v4();

        SseProgress::new(hub, Some(id)).notify("Updating 1/3: Ana");

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_PROGRESS));
        let data: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(data["message"], "Updating 1/3: Ana");
        assert_eq!(data["operation_id"], id.to_string());
    }

    #[test]
    fn tee_reaches_both_sinks() {
        let (first, mut first_rx) = mpsc::channel::<String>(2);
        let (second, mut second_rx) = mpsc::channel::<String>(2);

        Tee(&first, &second).notify("hello");

        assert_eq!(first_rx.try_recv().unwrap(), "hello");
        assert_eq!(second_rx.try_recv().unwrap(), "hello");
    }
}
