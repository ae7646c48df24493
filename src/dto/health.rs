use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// False when Airtable credentials are missing and the roster lives in the local cache only.
    pub store_configured: bool,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            store_configured: true,
        }
    }

    /// Degraded mode, either unconfigured or unreachable.
    pub fn degraded(store_configured: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            store_configured,
        }
    }
}
