use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod guilds;
pub mod health;
pub mod ladder;
pub mod members;
pub mod operations;
pub mod sse;
pub mod validation;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
