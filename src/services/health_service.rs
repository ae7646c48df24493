use tracing::warn;

use crate::{dto::health::HealthResponse, error::ServiceError, state::SharedState};

/// Report `ok` when the roster store answers, `degraded` otherwise.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let community = state.community();
    match community.store_health().await {
        Ok(()) => HealthResponse::ok(),
        Err(ServiceError::Degraded) => {
            warn!("roster store not configured (degraded mode)");
            HealthResponse::degraded(false)
        }
        Err(err) => {
            warn!(error = %err, "roster store health check failed");
            HealthResponse::degraded(true)
        }
    }
}
