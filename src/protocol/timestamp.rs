//! The `YYYY:MM:DD:HH:MM:SS` UTC timestamp format carried on the wire.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// Renders a timestamp zero-padded, e.g. `2026:08:02:09:15:04`.
pub fn render(timestamp: DateTime<Utc>) -> String {
    format!(
        "{:04}:{:02}:{:02}:{:02}:{:02}:{:02}",
        timestamp.year(),
        timestamp.month(),
        timestamp.day(),
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second()
    )
}

/// Parses the wire format back into a timestamp.
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    let mut parts = text.split(':');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    let hour = parts.next()?.parse().ok()?;
    let minute = parts.next()?.parse().ok()?;
    let second = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}
