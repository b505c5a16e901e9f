use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

/// Stored ids are always written from `Uuid::to_string`, so a parse failure
/// means a corrupt row, not caller input.
pub(crate) fn parse_uuid(s: &str, what: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, s, e);
        Uuid::default()
    })
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

pub(crate) fn parse_ts_opt(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.map(parse_ts)
}
