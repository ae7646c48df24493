use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{OperationFinishedEvent, ServerEvent},
    state::{ProgressHub, SharedState},
};

/// SSE event sent when an operation releases the slot.
pub const EVENT_OPERATION_FINISHED: &str = "operation_finished";

/// Subscribe to operation progress notifications.
pub fn subscribe_progress(state: &SharedState) -> broadcast::Receiver<ServerEvent> {
    state.progress_sse().subscribe()
}

/// Convert a broadcast receiver into an SSE response, forwarding events until
/// the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "progress subscriber lagging; messages dropped");
                            continue;
                        }
                    }
                }
            }
        }

        info!("Progress SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Announce the end of a background operation on the progress stream.
pub fn broadcast_operation_finished(hub: &ProgressHub, payload: &OperationFinishedEvent) {
    hub.publish(EVENT_OPERATION_FINISHED, payload);
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::services::operations::OperationKind;

    #[test]
    fn finished_event_carries_summary() {
        let hub = ProgressHub::new(4);
        let mut receiver = hub.subscribe();
        let operation_id = Uuid::new_v4();

        broadcast_operation_finished(
            &hub,
            &OperationFinishedEvent {
                operation_id,
                kind: OperationKind::MemberUpdate,
                written: 3,
                cancelled: false,
                message: "3 profiles updated".into(),
            },
        );

        let event = receiver.try_recv().unwrap();
        assert_eq!(event.event.as_deref(), Some(EVENT_OPERATION_FINISHED));
        let data: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(data["kind"], "member_update");
        assert_eq!(data["written"], 3);
    }
}
