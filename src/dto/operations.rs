use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::services::{guild_actions::GuildUpdateRequest, operations::OperationKind};

/// Options of a bulk ladder update started over HTTP.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateMembersRequest {
    /// Guild whose staleness threshold applies; every enabled member is refreshed without one.
    #[serde(default)]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub include_win_loss: bool,
}

impl From<UpdateMembersRequest> for GuildUpdateRequest {
    fn from(value: UpdateMembersRequest) -> Self {
        Self {
            guild_id: value.guild_id,
            force_update: value.force_update,
            include_win_loss: value.include_win_loss,
        }
    }
}

/// Returned with `202 Accepted` once a background operation is scheduled.
#[derive(Debug, Serialize, ToSchema)]
pub struct OperationStartedResponse {
    pub operation_id: Uuid,
    pub kind: OperationKind,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    /// False when no operation was running.
    pub cancelled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentOperationResponse {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<OperationKind>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RankingQuery {
    /// Also list disabled members.
    #[serde(default)]
    pub include_banned: bool,
}
