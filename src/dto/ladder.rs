use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    ladder::RegionGroup,
    services::community_service::{MAX_REGION_SAMPLE, RegionEstimate},
};

const DEFAULT_REGION_SAMPLE: u32 = 10;

#[derive(Debug, Serialize, ToSchema)]
pub struct DistributionsResponse {
    /// Players holding a rank tier on the ladder.
    pub ranked_players: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegionQuery {
    /// Recent matches to inspect, capped at 20.
    #[serde(default = "default_sample")]
    pub sample: u32,
}

fn default_sample() -> u32 {
    DEFAULT_REGION_SAMPLE.min(MAX_REGION_SAMPLE)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionCount {
    pub region: RegionGroup,
    pub matches: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegionResponse {
    pub account_id: String,
    /// Most frequent region, absent when no sampled match had a known region.
    pub region: Option<RegionGroup>,
    pub matches_sampled: usize,
    pub counts: Vec<RegionCount>,
}

impl From<RegionEstimate> for RegionResponse {
    fn from(value: RegionEstimate) -> Self {
        Self {
            account_id: value.account_id,
            region: value.region,
            matches_sampled: value.matches_sampled,
            counts: value
                .counts
                .into_iter()
                .map(|(region, matches)| RegionCount { region, matches })
                .collect(),
        }
    }
}
