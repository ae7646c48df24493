use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::dto::sse::ServerEvent;

/// Fan-out of operation events to every `/sse/progress` subscriber.
#[derive(Clone)]
pub struct ProgressHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl ProgressHub {
    /// Hub buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// New receiver; only events sent after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Whether any SSE client is connected.
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    /// Serialise `payload` as a named event. Nothing is sent while nobody listens.
    pub fn publish<T: Serialize>(&self, event: &str, payload: &T) {
        if !self.has_subscribers() {
            return;
        }
        match ServerEvent::json(Some(event.to_string()), payload) {
            Ok(event) => {
                let _ = self.sender.send(event);
            }
            Err(err) => warn!(event, error = %err, "failed to serialise sse payload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_subscribers_only() {
        let hub = ProgressHub::new(4);
        hub.publish("progress", &serde_json::json!({ "message": "lost" }));

        let mut receiver = hub.subscribe();
        assert!(hub.has_subscribers());
        hub.publish("progress", &serde_json::json!({ "message": "kept" }));

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some("progress"));
        assert_eq!(event.data, r#"{"message":"kept"}"#);
        assert!(receiver.try_recv().is_err());
    }
}
