use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/progress",
    tag = "sse",
    responses((status = 200, description = "Operation progress stream", content_type = "text/event-stream", body = String))
)]
/// Stream progress lines and operation results to connected clients.
pub async fn progress_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_progress(&state);
    info!("New progress SSE connection");
    sse_service::to_sse_stream(receiver)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/progress", get(progress_stream))
}
