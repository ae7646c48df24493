use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

/// Coarse server region a match was played in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
pub enum RegionGroup {
    /// European clusters.
    #[serde(rename = "EU")]
    Europe,
    /// North and South American clusters.
    #[serde(rename = "NA")]
    America,
    /// South-east Asian, Indian and Japanese clusters.
    #[serde(rename = "AS")]
    Asia,
    /// Perfect World clusters.
    #[serde(rename = "CN")]
    China,
}

impl RegionGroup {
    /// Two-letter code shown to users.
    pub fn code(self) -> &'static str {
        match self {
            RegionGroup::Europe => "EU",
            RegionGroup::America => "NA",
            RegionGroup::Asia => "AS",
            RegionGroup::China => "CN",
        }
    }
}

impl fmt::Display for RegionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Map an OpenDota cluster region id onto its group; unmapped ids yield `None`.
pub fn region_group(region_id: u32) -> Option<RegionGroup> {
    match region_id {
        // Luxembourg, Vienna, Stockholm, Austria, UK, Italy, Spain, Poland,
        // Greece, Romania, Turkey, Russia
        2 | 3 | 8 | 37 | 38 | 40 | 41 | 42 | 43 | 44 | 45 | 47 => Some(RegionGroup::Europe),
        // US West, US East, Brazil, Chile, Peru, Argentina
        0 | 1 | 9 | 13 | 14 | 25 => Some(RegionGroup::America),
        // Singapore, Dubai, Australia, South Africa, India, Japan, Taiwan,
        // UAE, Hong Kong, South Korea
        5 | 6 | 7 | 10 | 15 | 16 | 17 | 46 | 48 | 49 => Some(RegionGroup::Asia),
        // Perfect World clusters
        11 | 12 | 18 | 19 => Some(RegionGroup::China),
        _ => None,
    }
}
