use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Format a timestamp as RFC 3339. Falls back to an empty string for dates
/// RFC 3339 cannot represent (years outside 0..=9999).
pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

/// Current UTC time as RFC 3339.
pub fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}
