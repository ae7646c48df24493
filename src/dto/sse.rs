use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::operations::OperationKind;

#[derive(Clone, Debug)]
/// Dispatched payload carried across the SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Human-readable progress line emitted while an operation runs.
pub struct ProgressEvent {
    /// Operation the message belongs to, absent for ad-hoc notices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Emitted once when a background operation finishes.
pub struct OperationFinishedEvent {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    /// Records written to the roster store.
    pub written: usize,
    pub cancelled: bool,
    /// Summary shown to users, e.g. `12 profiles updated`.
    pub message: String,
}
