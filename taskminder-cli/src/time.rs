//! Local-time parsing and formatting for the shell.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const DUE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse().map_err(|_| anyhow!("invalid timezone: {tz}"))
}

/// Parse a due time like "2026-02-20 23:59" in `tz`, returning UTC.
pub fn parse_local_due(local: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let ndt = NaiveDateTime::parse_from_str(local.trim(), DUE_FORMAT)
        .map_err(|e| anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

pub fn format_local(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format(DUE_FORMAT).to_string()
}
